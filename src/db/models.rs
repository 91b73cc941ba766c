//! Database row types and the persisted message records carried in
//! outbound WebSocket frames (sender display data denormalized in).

use serde::{Deserialize, Serialize};

/// User record in the users table. Identity lookup collaborator —
/// display data is denormalized into outbound message frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Session record in the sessions table, keyed by the signed session id.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub sid: String,
    pub user_id: String,
    pub expires_at: String,
}

/// Persisted event-room message plus denormalized sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessageRecord {
    pub id: String,
    pub event_id: String,
    pub sender: UserProfile,
    pub content: String,
    pub created_at: String,
}

/// Persisted direct message plus denormalized sender.
/// Carries text content and/or a file descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageRecord {
    pub id: String,
    pub sender: UserProfile,
    pub recipient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: String,
}

/// Persisted group-chat message plus denormalized sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageRecord {
    pub id: String,
    pub group_id: String,
    pub sender: UserProfile,
    pub content: String,
    pub created_at: String,
}

/// Persisted event-planning-group message plus denormalized sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGroupMessageRecord {
    pub id: String,
    pub group_id: String,
    pub event_id: String,
    pub sender: UserProfile,
    pub content: String,
    pub created_at: String,
}
