//! Session verification for WebSocket upgrades.
//!
//! The web application authenticates users and stores a session row; the
//! browser carries a signed session cookie (`s:<sid>.<signature>` where the
//! signature is base64(HMAC-SHA256(sid, secret)) with padding stripped).
//! This module validates that cookie against the session store BEFORE the
//! upgrade handshake completes, so no unauthenticated frame is ever
//! dispatched and no partial connection state is left behind.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha2::Sha256;

use crate::db::{sessions, DbPool};

type HmacSha256 = Hmac<Sha256>;

/// Why an upgrade was refused. All variants map to a 401 response;
/// the distinction exists for logging only.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionRejection {
    MissingCookie,
    InvalidSignature,
    UnknownSession,
    SessionExpired,
}

impl std::fmt::Display for SessionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRejection::MissingCookie => write!(f, "session cookie missing"),
            SessionRejection::InvalidSignature => write!(f, "session signature mismatch"),
            SessionRejection::UnknownSession => write!(f, "session not found"),
            SessionRejection::SessionExpired => write!(f, "session expired"),
        }
    }
}

/// Extract the named cookie from a raw Cookie header, percent-decoded.
pub fn extract_cookie(header: &str, name: &str) -> Option<String> {
    for pair in header.split(';') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if key == name {
            return percent_decode_str(value)
                .decode_utf8()
                .ok()
                .map(|v| v.into_owned());
        }
    }
    None
}

/// Strip the `s:` signature prefix and verify the signature against the
/// shared secret. Unsigned values pass through as-is (the signature prefix
/// is optional in the cookie contract).
pub fn unsign(value: &str, secret: &[u8]) -> Result<String, SessionRejection> {
    let Some(signed) = value.strip_prefix("s:") else {
        return Ok(value.to_string());
    };

    let (sid, signature) = signed
        .rsplit_once('.')
        .ok_or(SessionRejection::InvalidSignature)?;

    let tag = STANDARD_NO_PAD
        .decode(signature.trim_end_matches('='))
        .map_err(|_| SessionRejection::InvalidSignature)?;

    // Mac::verify_slice is constant-time
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SessionRejection::InvalidSignature)?;
    mac.update(sid.as_bytes());
    mac.verify_slice(&tag)
        .map_err(|_| SessionRejection::InvalidSignature)?;

    Ok(sid.to_string())
}

/// Sign a session id the way the web application does. Used by tests and
/// provisioning tooling to mint valid cookies.
pub fn sign(sid: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(sid.as_bytes());
    let tag = mac.finalize().into_bytes();
    format!("s:{}.{}", sid, STANDARD_NO_PAD.encode(tag))
}

/// Full pre-accept verification: cookie header → signed cookie → session
/// store → authenticated user id. Runs the store lookup on the blocking
/// pool; the upgrade must not complete until this resolves.
pub async fn verify_session(
    db: &DbPool,
    secret: &[u8],
    cookie_name: &str,
    cookie_header: Option<&str>,
) -> Result<String, SessionRejection> {
    let header = cookie_header.ok_or(SessionRejection::MissingCookie)?;
    let raw = extract_cookie(header, cookie_name).ok_or(SessionRejection::MissingCookie)?;
    let sid = unsign(&raw, secret)?;

    let db = db.clone();
    let session = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| SessionRejection::UnknownSession)?;
        sessions::find_session(&conn, &sid).map_err(|_| SessionRejection::UnknownSession)
    })
    .await
    .map_err(|_| SessionRejection::UnknownSession)??;

    let session = session.ok_or(SessionRejection::UnknownSession)?;
    if sessions::is_expired(&session, chrono::Utc::now()) {
        return Err(SessionRejection::SessionExpired);
    }
    if session.user_id.is_empty() {
        return Err(SessionRejection::UnknownSession);
    }

    Ok(session.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"keyboard cat";

    #[test]
    fn extract_finds_named_cookie_among_many() {
        let header = "theme=dark; connect.sid=s%3Aabc.def; lang=en";
        assert_eq!(
            extract_cookie(header, "connect.sid").as_deref(),
            Some("s:abc.def")
        );
        assert_eq!(extract_cookie(header, "missing"), None);
    }

    #[test]
    fn unsign_accepts_valid_signature() {
        let cookie = sign("session-123", SECRET);
        assert_eq!(unsign(&cookie, SECRET).unwrap(), "session-123");
    }

    #[test]
    fn unsign_rejects_tampered_sid() {
        let cookie = sign("session-123", SECRET);
        let tampered = cookie.replace("session-123", "session-456");
        assert_eq!(
            unsign(&tampered, SECRET),
            Err(SessionRejection::InvalidSignature)
        );
    }

    #[test]
    fn unsign_rejects_wrong_secret() {
        let cookie = sign("session-123", b"other secret");
        assert_eq!(
            unsign(&cookie, SECRET),
            Err(SessionRejection::InvalidSignature)
        );
    }

    #[test]
    fn unsigned_value_passes_through() {
        assert_eq!(unsign("plain-sid", SECRET).unwrap(), "plain-sid");
    }

    #[test]
    fn signed_value_without_dot_is_rejected() {
        assert_eq!(
            unsign("s:no-signature-here", SECRET),
            Err(SessionRejection::InvalidSignature)
        );
    }
}
