//! WebSocket infrastructure: connection registry, live note sessions, and
//! the heartbeat task.

pub mod handler;
pub mod heartbeat;
pub mod manager;
pub mod messages;
pub mod session;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{WsManager, WsSender};
