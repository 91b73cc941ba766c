//! Presence tracking for event rooms.
//!
//! The presence set is derived from the registry's scope member sets, so
//! there is no second store to keep consistent. Every change broadcasts a
//! full snapshot to the scope's members — no diffing, so a client that
//! misses one broadcast converges on the next.

use crate::state::AppState;
use crate::ws::frames::{PresenceUser, ServerFrame};
use crate::ws::{broadcast, event_scope};

/// Broadcast the current presence snapshot of an event room to every
/// connection joined to it.
pub fn broadcast_event_presence(state: &AppState, event_id: &str) {
    broadcast_scope_presence(state, &event_scope(event_id));
}

/// Same, addressed by scope id (used from connection cleanup, which only
/// knows which scopes it left).
pub fn broadcast_scope_presence(state: &AppState, scope_id: &str) {
    let event_id = scope_id.strip_prefix("event:").unwrap_or(scope_id);
    let members = state.registry.members(scope_id);
    if members.is_empty() {
        // Empty sets are already deleted; nobody left to notify
        return;
    }

    let mut users: Vec<PresenceUser> = Vec::with_capacity(members.len());
    for member in &members {
        if users.iter().all(|u| u.id != member.user_id) {
            users.push(PresenceUser {
                id: member.user_id.clone(),
                display_name: member.display_name.clone(),
            });
        }
    }

    let frame = ServerFrame::Presence {
        event_id: event_id.to_string(),
        users,
    };
    broadcast::broadcast_to_scope(&state.registry, scope_id, &frame);
}
