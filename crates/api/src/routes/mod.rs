pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                      WebSocket (live note session; ?token= auth)
///
/// /notes                   list (GET), create (POST)
/// /notes/{id}              get, update (PATCH), delete
///
/// /assist/title            generate a title from content (POST)
/// /assist/summary          summarize content (POST)
///
/// /settings/store          read (GET) / replace (PUT) store overrides
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket.
        .route("/ws", get(ws::ws_handler))
        // Notes.
        .route(
            "/notes",
            get(handlers::notes::list_notes).post(handlers::notes::create_note),
        )
        .route(
            "/notes/{id}",
            get(handlers::notes::get_note)
                .patch(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
        // Assist.
        .route("/assist/title", post(handlers::assist::generate_title))
        .route("/assist/summary", post(handlers::assist::summarize))
        // Settings.
        .route(
            "/settings/store",
            get(handlers::settings::get_store_settings)
                .put(handlers::settings::update_store_settings),
        )
}
