//! User lookups and seed helpers. Account creation belongs to the web
//! application; the realtime server only reads display data.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::UserProfile;
use super::StoreError;

/// Fetch a user's display profile for denormalizing into outbound frames.
pub fn find_profile(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, display_name, avatar_url FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(UserProfile {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    avatar_url: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Fetch a profile, erroring when the user does not exist.
pub fn get_profile(conn: &Connection, user_id: &str) -> Result<UserProfile, StoreError> {
    find_profile(conn, user_id)?.ok_or(StoreError::NotFound("user"))
}

/// Insert a user row. Used by tests and provisioning scripts.
pub fn create_user(
    conn: &Connection,
    id: &str,
    display_name: &str,
    avatar_url: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (id, display_name, avatar_url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, display_name, avatar_url, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
