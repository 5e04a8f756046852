use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use econote_assist::AssistError;
use econote_core::CoreError;
use econote_store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain and store error taxonomies and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses. Every error is scoped to its operation; none are fatal to the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `econote_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the remote document store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error from the generative text service.
    #[error(transparent)]
    Assist(#[from] AssistError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::PermissionDenied(msg) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
                }
                CoreError::Connectivity(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "STORE_UNAVAILABLE",
                    msg.clone(),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Store errors ---
            AppError::Store(err) => classify_store_error(err),

            // --- Assist errors ---
            AppError::Assist(err) => match err {
                AssistError::Input(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                other => {
                    tracing::warn!(error = %other, "Assist request failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        "ASSIST_FAILED",
                        "The assist service could not complete the request".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a store error into an HTTP status, error code, and message.
///
/// - `PermissionDenied` maps to 403 (the caller is not the owner).
/// - `NotFound` maps to 404 (write/delete against a missing document).
/// - Connectivity and availability failures map to 502: the server is fine,
///   the upstream store is not.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("note with id {id} not found"),
        ),
        StoreError::Connection(msg) | StoreError::Unavailable(msg) => {
            tracing::warn!(error = %msg, "Store unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "STORE_UNAVAILABLE",
                "The document store is unavailable".to_string(),
            )
        }
        StoreError::Protocol(msg) | StoreError::Decode(msg) => {
            tracing::error!(error = %msg, "Store protocol error");
            (
                StatusCode::BAD_GATEWAY,
                "STORE_PROTOCOL_ERROR",
                "The document store returned an invalid response".to_string(),
            )
        }
    }
}
