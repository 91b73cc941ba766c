//! Fan-out helpers over the connection registry.
//! Frames are serialized once per broadcast, then cloned per receiver.

use axum::extract::ws::Message;

use super::frames::ServerFrame;
use super::registry::Registry;
use super::ConnectionSender;

/// Serialize a server frame into a WebSocket text message.
fn encode(frame: &ServerFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server frame");
            None
        }
    }
}

/// Send a frame down one connection's channel.
pub fn send_to_conn(tx: &ConnectionSender, frame: &ServerFrame) {
    if let Some(msg) = encode(frame) {
        let _ = tx.send(msg);
    }
}

/// Send a frame to an identity's live connection, if any.
/// Returns whether a live connection existed.
pub fn send_to_user(registry: &Registry, user_id: &str, frame: &ServerFrame) -> bool {
    let Some(msg) = encode(frame) else {
        return false;
    };
    match registry.find(user_id) {
        Some(handle) => {
            let _ = handle.tx.send(msg);
            true
        }
        None => false,
    }
}

/// Send a frame to every identity in the list that is currently online.
/// Offline members are skipped silently; they catch up via history fetch.
pub fn send_to_users(registry: &Registry, user_ids: &[String], frame: &ServerFrame) {
    let Some(msg) = encode(frame) else {
        return;
    };
    for user_id in user_ids {
        if let Some(handle) = registry.find(user_id) {
            let _ = handle.tx.send(msg.clone());
        }
    }
}

/// Broadcast a frame to every live connection in a scope's member set.
pub fn broadcast_to_scope(registry: &Registry, scope_id: &str, frame: &ServerFrame) {
    let Some(msg) = encode(frame) else {
        return;
    };
    for member in registry.members(scope_id) {
        let _ = member.tx.send(msg.clone());
    }
}
