//! Store-level error taxonomy.

/// Errors surfaced by the Remote Document Store client.
///
/// All variants carry only strings so the error can be cloned into
/// subscription slots. None of these are retried by the client -- the
/// consumer decides whether to re-bind or re-issue the write.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The listen channel or HTTP call could not reach the store.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected the operation: the caller is not the owner.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store is reachable but refused service (5xx, overload).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The target document does not exist (write/delete surface only;
    /// subscriptions report a missing document as a snapshot state).
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The store sent a frame we could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A wire document failed validation into a domain entity.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Map a wire-level error code (from a server `error` frame) to a
    /// variant. Unknown codes become protocol errors.
    pub fn from_wire_code(code: &str, message: &str) -> Self {
        match code {
            "permission_denied" => StoreError::PermissionDenied(message.to_owned()),
            "unavailable" => StoreError::Unavailable(message.to_owned()),
            "not_found" => StoreError::NotFound(message.to_owned()),
            other => StoreError::Protocol(format!("{other}: {message}")),
        }
    }
}
