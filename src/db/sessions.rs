//! Session store lookups. Sessions are created by the web application's
//! login flow — this server only reads (and tests seed) them.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::SessionRow;
use super::StoreError;

/// Look up a session by id. Returns None for unknown sessions.
pub fn find_session(conn: &Connection, sid: &str) -> Result<Option<SessionRow>, StoreError> {
    let row = conn
        .query_row(
            "SELECT sid, user_id, expires_at FROM sessions WHERE sid = ?1",
            params![sid],
            |row| {
                Ok(SessionRow {
                    sid: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Whether a session row has passed its expiry timestamp.
pub fn is_expired(session: &SessionRow, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(&session.expires_at) {
        Ok(expires) => expires <= now,
        // Unparseable expiry is treated as expired
        Err(_) => true,
    }
}

/// Insert a session. Used by tests and standalone deployments;
/// in production the web application owns session creation.
pub fn create_session(
    conn: &Connection,
    sid: &str,
    user_id: &str,
    ttl: Duration,
) -> Result<(), StoreError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO sessions (sid, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            sid,
            user_id,
            (now + ttl).to_rfc3339(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Delete a session (logout path, exercised by tests).
pub fn delete_session(conn: &Connection, sid: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM sessions WHERE sid = ?1", params![sid])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[test]
    fn find_returns_none_for_unknown_sid() {
        let conn = test_db();
        assert!(find_session(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn create_then_find_roundtrip() {
        let conn = test_db();
        crate::db::users::create_user(&conn, "u1", "Ada", None).unwrap();
        create_session(&conn, "sid-1", "u1", Duration::hours(1)).unwrap();

        let session = find_session(&conn, "sid-1").unwrap().expect("session");
        assert_eq!(session.user_id, "u1");
        assert!(!is_expired(&session, Utc::now()));
    }

    #[test]
    fn expired_session_is_detected() {
        let conn = test_db();
        crate::db::users::create_user(&conn, "u1", "Ada", None).unwrap();
        create_session(&conn, "sid-1", "u1", Duration::hours(-1)).unwrap();

        let session = find_session(&conn, "sid-1").unwrap().expect("session");
        assert!(is_expired(&session, Utc::now()));
    }
}
