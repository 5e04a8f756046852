//! Store-settings handlers.
//!
//! The settings form lets an operator repoint the server at a different
//! store project without a rebuild. Overrides are persisted to the local
//! settings file and win over the environment on the next startup; the
//! live connection is not re-established.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use econote_store::{read_overrides_from, save_overrides_to, StoreOverrides};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/settings/store
///
/// The currently persisted overrides (not the effective config -- secrets
/// sourced from the environment are never echoed back).
pub async fn get_store_settings(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<DataResponse<StoreOverrides>>> {
    let overrides = read_overrides_from(&state.config.settings_path)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    Ok(Json(DataResponse { data: overrides }))
}

/// PUT /api/v1/settings/store
///
/// Replace the persisted overrides with the request body. Omitted keys are
/// cleared, so they fall back to the environment.
pub async fn update_store_settings(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(overrides): Json<StoreOverrides>,
) -> AppResult<StatusCode> {
    if overrides == StoreOverrides::default() {
        return Err(AppError::BadRequest(
            "at least one of project_id, api_key, auth_domain is required".into(),
        ));
    }

    save_overrides_to(&state.config.settings_path, &overrides)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!(
        path = %state.config.settings_path.display(),
        "Store settings updated; effective on next startup",
    );
    Ok(StatusCode::NO_CONTENT)
}
