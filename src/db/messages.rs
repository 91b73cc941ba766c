//! Message persistence — one create/fetch pair per chat scope kind.
//!
//! Create functions assign the server-side id (UUIDv7) and timestamp and
//! return the full record with the sender's display data denormalized in,
//! ready to be carried in the outbound frame. The router fans a message out
//! only after the create call has returned (durability before visibility).

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::models::{
    DirectMessageRecord, EventGroupMessageRecord, EventMessageRecord, GroupMessageRecord,
};
use super::users::get_profile;
use super::StoreError;

/// Persist an event-room message.
pub fn create_event_message(
    conn: &Connection,
    event_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<EventMessageRecord, StoreError> {
    let sender = get_profile(conn, sender_id)?;
    let id = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO event_messages (id, event_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, event_id, sender_id, content, created_at],
    )?;

    Ok(EventMessageRecord {
        id,
        event_id: event_id.to_string(),
        sender,
        content: content.to_string(),
        created_at,
    })
}

/// Persist a direct message (text and/or file descriptor).
pub fn create_direct_message(
    conn: &Connection,
    sender_id: &str,
    recipient_id: &str,
    content: Option<&str>,
    file_url: Option<&str>,
    file_name: Option<&str>,
) -> Result<DirectMessageRecord, StoreError> {
    let sender = get_profile(conn, sender_id)?;
    let id = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO direct_messages (id, sender_id, recipient_id, content, file_url, file_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, sender_id, recipient_id, content, file_url, file_name, created_at],
    )?;

    Ok(DirectMessageRecord {
        id,
        sender,
        recipient_id: recipient_id.to_string(),
        content: content.map(str::to_string),
        file_url: file_url.map(str::to_string),
        file_name: file_name.map(str::to_string),
        created_at,
    })
}

/// Persist a group-chat message.
pub fn create_group_message(
    conn: &Connection,
    group_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<GroupMessageRecord, StoreError> {
    let sender = get_profile(conn, sender_id)?;
    let id = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO group_messages (id, group_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, group_id, sender_id, content, created_at],
    )?;

    Ok(GroupMessageRecord {
        id,
        group_id: group_id.to_string(),
        sender,
        content: content.to_string(),
        created_at,
    })
}

/// Persist an event-planning-group message.
pub fn create_event_group_message(
    conn: &Connection,
    event_group_id: &str,
    event_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<EventGroupMessageRecord, StoreError> {
    let sender = get_profile(conn, sender_id)?;
    let id = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO event_group_messages (id, event_group_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, event_group_id, sender_id, content, created_at],
    )?;

    Ok(EventGroupMessageRecord {
        id,
        group_id: event_group_id.to_string(),
        event_id: event_id.to_string(),
        sender,
        content: content.to_string(),
        created_at,
    })
}

/// History fetch for an event room, newest first.
pub fn event_history(
    conn: &Connection,
    event_id: &str,
    limit: u32,
) -> Result<Vec<EventMessageRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.event_id, m.sender_id, m.content, m.created_at,
                u.display_name, u.avatar_url
         FROM event_messages m
         JOIN users u ON u.id = m.sender_id
         WHERE m.event_id = ?1
         ORDER BY m.created_at DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![event_id, limit], |row| {
            Ok(EventMessageRecord {
                id: row.get(0)?,
                event_id: row.get(1)?,
                sender: super::models::UserProfile {
                    id: row.get(2)?,
                    display_name: row.get(5)?,
                    avatar_url: row.get(6)?,
                },
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// History fetch for a direct conversation, newest first.
/// Offline recipients rely on this — the relay never queues.
pub fn direct_history(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
    limit: u32,
) -> Result<Vec<DirectMessageRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, m.recipient_id, m.content, m.file_url, m.file_name, m.created_at,
                u.display_name, u.avatar_url
         FROM direct_messages m
         JOIN users u ON u.id = m.sender_id
         WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
            OR (m.sender_id = ?2 AND m.recipient_id = ?1)
         ORDER BY m.created_at DESC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(params![user_a, user_b, limit], |row| {
            Ok(DirectMessageRecord {
                id: row.get(0)?,
                sender: super::models::UserProfile {
                    id: row.get(1)?,
                    display_name: row.get(7)?,
                    avatar_url: row.get(8)?,
                },
                recipient_id: row.get(2)?,
                content: row.get(3)?,
                file_url: row.get(4)?,
                file_name: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// History fetch for a group chat, newest first.
pub fn group_history(
    conn: &Connection,
    group_id: &str,
    limit: u32,
) -> Result<Vec<GroupMessageRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.group_id, m.sender_id, m.content, m.created_at,
                u.display_name, u.avatar_url
         FROM group_messages m
         JOIN users u ON u.id = m.sender_id
         WHERE m.group_id = ?1
         ORDER BY m.created_at DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![group_id, limit], |row| {
            Ok(GroupMessageRecord {
                id: row.get(0)?,
                group_id: row.get(1)?,
                sender: super::models::UserProfile {
                    id: row.get(2)?,
                    display_name: row.get(5)?,
                    avatar_url: row.get(6)?,
                },
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// History fetch for an event planning group, newest first.
pub fn event_group_history(
    conn: &Connection,
    event_group_id: &str,
    limit: u32,
) -> Result<Vec<EventGroupMessageRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.event_group_id, g.event_id, m.sender_id, m.content, m.created_at,
                u.display_name, u.avatar_url
         FROM event_group_messages m
         JOIN event_groups g ON g.id = m.event_group_id
         JOIN users u ON u.id = m.sender_id
         WHERE m.event_group_id = ?1
         ORDER BY m.created_at DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![event_group_id, limit], |row| {
            Ok(EventGroupMessageRecord {
                id: row.get(0)?,
                group_id: row.get(1)?,
                event_id: row.get(2)?,
                sender: super::models::UserProfile {
                    id: row.get(3)?,
                    display_name: row.get(6)?,
                    avatar_url: row.get(7)?,
                },
                content: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{access, test_db, users};

    #[test]
    fn direct_message_persists_and_is_retrievable() {
        let conn = test_db();
        users::create_user(&conn, "u1", "Ada", None).unwrap();
        users::create_user(&conn, "u2", "Ben", None).unwrap();

        let record =
            create_direct_message(&conn, "u1", "u2", Some("hey"), None, None).unwrap();
        assert_eq!(record.sender.display_name, "Ada");
        assert!(record.content.as_deref() == Some("hey"));

        let history = direct_history(&conn, "u2", "u1", 50).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);
    }

    #[test]
    fn create_rejects_unknown_sender() {
        let conn = test_db();
        users::create_user(&conn, "u2", "Ben", None).unwrap();
        let err = create_direct_message(&conn, "ghost", "u2", Some("hi"), None, None);
        assert!(err.is_err());
    }

    #[test]
    fn event_group_record_carries_parent_event() {
        let conn = test_db();
        users::create_user(&conn, "u1", "Ada", None).unwrap();
        access::create_event(&conn, "e1", "Launch").unwrap();
        access::create_event_group(&conn, "eg1", "e1", "Logistics").unwrap();

        let record = create_event_group_message(&conn, "eg1", "e1", "u1", "hello").unwrap();
        assert_eq!(record.event_id, "e1");

        let history = event_group_history(&conn, "eg1", 10).unwrap();
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[0].event_id, "e1");
    }
}
