use std::sync::Arc;

use econote_assist::AssistClient;
use econote_store::DocumentStore;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (everything is behind `Arc`). The store connection is
/// constructed once at startup and injected here; there is no global
/// connection singleton.
#[derive(Clone)]
pub struct AppState {
    /// Live connection to the remote document store.
    pub store: Arc<dyn DocumentStore>,
    /// Client for the generative text service.
    pub assist: Arc<AssistClient>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
}
