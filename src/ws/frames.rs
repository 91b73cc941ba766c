//! The JSON frame protocol: one object per WebSocket text message,
//! discriminated by a `type` field.
//!
//! Closed sum types on both directions — adding a frame kind forces every
//! dispatch site through the compiler. Sender identity is never read from
//! an inbound frame; it always comes from the authenticated connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{
    DirectMessageRecord, EventGroupMessageRecord, EventMessageRecord, GroupMessageRecord,
    UserProfile,
};

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Join an event room (re-checks access, triggers presence broadcast).
    Join { event_id: String },
    /// Chat message to the currently-joined event room.
    Message { content: String },
    /// One-to-one message; content and/or file descriptor required.
    DirectMessage {
        recipient_id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        file_url: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
    },
    /// Message to a multi-member group chat.
    GroupMessage { group_id: String, content: String },
    /// Message to an event planning group (re-checks access).
    EventGroupMessage { group_id: String, content: String },
    /// Call setup: SDP offer for the recipient.
    CallOffer {
        recipient_id: String,
        offer: Value,
        call_type: String,
    },
    /// Call setup: SDP answer back to the caller.
    CallAnswer { caller_id: String, answer: Value },
    /// Call setup: ICE candidate for the target peer.
    CallIceCandidate { target_id: String, candidate: Value },
    /// Decline an incoming call.
    CallReject { caller_id: String },
    /// Hang up an active call.
    CallEnd { peer_id: String },
}

/// One entry in a presence snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub id: String,
    pub display_name: String,
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Acknowledges a successful event-room join.
    Joined { event_id: String },
    /// Full presence snapshot for an event room (no diffing).
    Presence {
        event_id: String,
        users: Vec<PresenceUser>,
    },
    /// Event-room message echo/broadcast with the persisted record.
    Message { message: EventMessageRecord },
    DirectMessage { message: DirectMessageRecord },
    GroupMessage { message: GroupMessageRecord },
    EventGroupMessage { message: EventGroupMessageRecord },
    /// Per-operation failure, sent only to the originating connection.
    Error { code: u16, message: String },
    /// Relayed call frames; sender is the authenticated peer identity.
    CallOffer {
        sender: UserProfile,
        offer: Value,
        call_type: String,
    },
    CallAnswer { sender_id: String, answer: Value },
    CallIceCandidate { sender_id: String, candidate: Value },
    CallRejected { sender_id: String },
    CallEnded { sender_id: String },
    /// Reply to the caller when the offer target has no live connection.
    CallFailed { target_id: String, reason: String },
}
