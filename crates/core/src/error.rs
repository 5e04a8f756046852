//! Shared domain error taxonomy.
//!
//! Every error is scoped to the single operation that produced it; nothing
//! here is fatal to the process and nothing is retried at the data layer.

/// Domain-level errors shared across crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A channel open or write failed for network reasons. Surfaced, not
    /// retried.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The operation was rejected because the caller is not the owner.
    /// Never retried.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Input failed validation at the boundary.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An entity lookup failed at the request boundary. A missing *live*
    /// document is not an error -- subscriptions report it as a distinct
    /// snapshot state instead.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
