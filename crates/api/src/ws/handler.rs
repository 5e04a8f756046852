//! WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use econote_core::{CoreError, UserId};

use crate::auth::token::verify_id_token;
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::session::Session;

/// Query parameters for the WebSocket upgrade. Browsers cannot set headers
/// on WebSocket requests, so the ID token travels as `?token=`.
#[derive(Debug, Deserialize)]
pub struct WsAuthParams {
    pub token: String,
}

/// HTTP handler that authenticates and upgrades the connection.
///
/// The token is verified *before* the upgrade so unauthenticated clients
/// get a proper 401 instead of a dropped socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsAuthParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let claims = verify_id_token(&params.token, &state.config.id_token).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
    })?;
    let user_id = UserId::new(claims.sub);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Starts the live note session (list binding + forwarding tasks).
///   4. Processes inbound frames on the current task.
///   5. Releases everything on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    let ws_manager = state.ws_manager.clone();
    let (sender, mut rx) = ws_manager.add(conn_id.clone(), user_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let mut session = Session::new(state, user_id, sender);
    session.start().await;

    // Receiver loop: process inbound frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                session.handle_frame(text.as_str()).await;
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: release all bindings, remove connection, stop sender task.
    session.shutdown();
    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
