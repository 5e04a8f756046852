//! Keep-alive pings for live note sessions.
//!
//! Proxies between the browser and this server drop idle connections;
//! a session that is only listening (no edits) would otherwise look idle.

use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::WsManager;

/// Seconds between pings. Well under common idle-timeout defaults.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn the ping loop. It runs until the returned handle is aborted at
/// shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }
    })
}
