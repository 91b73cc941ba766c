//! Membership and access checks for the three chat scope kinds.
//!
//! Event and planning-group access is re-checked on every join and every
//! message, never cached from connection time — access can be revoked
//! mid-session and must take effect on the next operation.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::StoreError;

/// Whether a user may access an event's room and presence.
pub fn can_access_event(
    conn: &Connection,
    user_id: &str,
    event_id: &str,
) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM event_members WHERE event_id = ?1 AND user_id = ?2",
        params![event_id, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether a user is a member of a group chat.
pub fn is_group_member(
    conn: &Connection,
    user_id: &str,
    group_id: &str,
) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ?1 AND user_id = ?2",
        params![group_id, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether a user is a member of an event planning group.
pub fn is_event_group_member(
    conn: &Connection,
    user_id: &str,
    event_group_id: &str,
) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM event_group_members WHERE event_group_id = ?1 AND user_id = ?2",
        params![event_group_id, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Member ids of a group chat, for identity-addressed fan-out.
pub fn group_member_ids(conn: &Connection, group_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY user_id")?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Member ids of an event planning group, for identity-addressed fan-out.
pub fn event_group_member_ids(
    conn: &Connection,
    event_group_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM event_group_members WHERE event_group_id = ?1 ORDER BY user_id",
    )?;
    let ids = stmt
        .query_map(params![event_group_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// The event a planning group belongs to.
pub fn event_id_of_group(
    conn: &Connection,
    event_group_id: &str,
) -> Result<Option<String>, StoreError> {
    let id = conn
        .query_row(
            "SELECT event_id FROM event_groups WHERE id = ?1",
            params![event_group_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// --- Seed helpers (membership is defined by the surrounding CRUD layer;
// --- tests and provisioning scripts use these directly) ---

pub fn create_event(conn: &Connection, id: &str, title: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO events (id, title, created_at) VALUES (?1, ?2, ?3)",
        params![id, title, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn add_event_member(conn: &Connection, event_id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO event_members (event_id, user_id) VALUES (?1, ?2)",
        params![event_id, user_id],
    )?;
    Ok(())
}

pub fn remove_event_member(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM event_members WHERE event_id = ?1 AND user_id = ?2",
        params![event_id, user_id],
    )?;
    Ok(())
}

pub fn create_group(conn: &Connection, id: &str, name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id, name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn add_group_member(conn: &Connection, group_id: &str, user_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
        params![group_id, user_id],
    )?;
    Ok(())
}

pub fn remove_group_member(
    conn: &Connection,
    group_id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
        params![group_id, user_id],
    )?;
    Ok(())
}

pub fn create_event_group(
    conn: &Connection,
    id: &str,
    event_id: &str,
    name: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO event_groups (id, event_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, event_id, name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn add_event_group_member(
    conn: &Connection,
    event_group_id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO event_group_members (event_group_id, user_id) VALUES (?1, ?2)",
        params![event_group_id, user_id],
    )?;
    Ok(())
}
