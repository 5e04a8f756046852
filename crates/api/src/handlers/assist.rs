//! Handlers for the generative text endpoints.
//!
//! Both endpoints are strictly request/response: the note itself is never
//! mutated here. The client decides whether to apply the returned text.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for both assist endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct AssistRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// POST /assist/title
///
/// Generate a short title (at most ten words) for the given content.
pub async fn generate_title(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AssistRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let title = state.assist.generate_title(&input.content).await?;
    Ok(Json(DataResponse {
        data: TitleResponse { title },
    }))
}

/// POST /assist/summary
///
/// Produce a short prose summary of the given content.
pub async fn summarize(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AssistRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let summary = state.assist.summarize(&input.content).await?;
    Ok(Json(DataResponse {
        data: SummaryResponse { summary },
    }))
}
