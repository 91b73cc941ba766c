pub mod actor;
pub mod broadcast;
pub mod frames;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Scope id of an event room, the only scope kind with joined state.
/// Direct and group scopes are addressed by identity instead.
pub fn event_scope(event_id: &str) -> String {
    format!("event:{event_id}")
}
