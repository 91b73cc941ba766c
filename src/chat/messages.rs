//! The message router: join handling plus the four chat-message kinds.
//!
//! Every handler follows the same shape: validate the frame, re-check
//! access where the scope requires it, persist on the blocking pool, and
//! only then fan out (durability before visibility). Any failure sends a
//! single `error` frame to the originating connection and nothing else —
//! other scope members never see a trace of a rejected operation.

use crate::db::{access, messages as store, users, StoreError};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_scope, send_to_conn, send_to_user, send_to_users};
use crate::ws::event_scope;
use crate::ws::frames::ServerFrame;
use crate::ws::registry::{ConnectionHandle, ScopeMember};

use super::presence;

/// Maximum message content length (chars).
const MAX_CONTENT_LENGTH: usize = 4000;

/// Why an operation was rejected before fan-out.
enum OpError {
    Denied(&'static str),
    NotFound(&'static str),
    Invalid(&'static str),
    Store(StoreError),
}

impl From<StoreError> for OpError {
    fn from(e: StoreError) -> Self {
        match e {
            // A missing row (user deleted mid-session, say) is the client's
            // 404, not a storage fault. The store only reports missing users.
            StoreError::NotFound(_) => OpError::NotFound("User not found"),
            other => OpError::Store(other),
        }
    }
}

fn send_op_error(conn: &ConnectionHandle, err: OpError) {
    let (code, message) = match err {
        OpError::Invalid(msg) => (400, msg.to_string()),
        OpError::Denied(msg) => (403, msg.to_string()),
        OpError::NotFound(msg) => (404, msg.to_string()),
        OpError::Store(e) => {
            tracing::error!(user_id = %conn.user_id, error = %e, "Storage error");
            (500, "Internal storage error".to_string())
        }
    };
    send_to_conn(&conn.tx, &ServerFrame::Error { code, message });
}

fn validate_content(content: &str) -> Result<(), OpError> {
    if content.trim().is_empty() {
        return Err(OpError::Invalid("Message content must not be empty"));
    }
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(OpError::Invalid("Message content too long"));
    }
    Ok(())
}

/// Run a storage closure on the blocking pool against the shared connection.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, OpError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, OpError> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| OpError::Store(StoreError::LockPoisoned))?;
        f(&conn)
    })
    .await
    .map_err(|_| OpError::Store(StoreError::LockPoisoned))?
}

/// `join`: enter an event room. Access is re-checked against the store on
/// every join, never cached from connection time — revocation must take
/// effect on the next attempt. Success acks the requester and broadcasts a
/// presence snapshot; joining a new room implicitly leaves the previous one.
pub async fn handle_join(
    state: &AppState,
    conn: &ConnectionHandle,
    joined_event: &mut Option<String>,
    event_id: String,
) {
    let user_id = conn.user_id.clone();
    let eid = event_id.clone();

    let result = with_store(state, move |db| {
        if !access::can_access_event(db, &user_id, &eid)? {
            return Err(OpError::Denied("Not authorized for this event"));
        }
        Ok(users::get_profile(db, &user_id)?)
    })
    .await;

    let profile = match result {
        Ok(profile) => profile,
        Err(err) => {
            send_op_error(conn, err);
            return;
        }
    };

    // Leave the previously-joined room, if different, and tell its members
    if let Some(previous) = joined_event.take() {
        if previous != event_id {
            state.registry.leave_scope(&event_scope(&previous), &conn.user_id);
            presence::broadcast_event_presence(state, &previous);
        }
    }

    state.registry.join_scope(
        &event_scope(&event_id),
        ScopeMember {
            conn_id: conn.conn_id,
            user_id: conn.user_id.clone(),
            display_name: profile.display_name,
            tx: conn.tx.clone(),
        },
    );
    *joined_event = Some(event_id.clone());

    tracing::debug!(user_id = %conn.user_id, event_id = %event_id, "Joined event room");

    send_to_conn(
        &conn.tx,
        &ServerFrame::Joined {
            event_id: event_id.clone(),
        },
    );
    presence::broadcast_event_presence(state, &event_id);
}

/// `message`: chat in the currently-joined event room.
pub async fn handle_room_message(
    state: &AppState,
    conn: &ConnectionHandle,
    joined_event: Option<&str>,
    content: String,
) {
    let Some(event_id) = joined_event else {
        send_op_error(conn, OpError::Invalid("Join an event room first"));
        return;
    };
    if let Err(err) = validate_content(&content) {
        send_op_error(conn, err);
        return;
    }

    let user_id = conn.user_id.clone();
    let eid = event_id.to_string();

    let result = with_store(state, move |db| {
        // Access can be revoked mid-session; re-check before persisting
        if !access::can_access_event(db, &user_id, &eid)? {
            return Err(OpError::Denied("Not authorized for this event"));
        }
        Ok(store::create_event_message(db, &eid, &user_id, &content)?)
    })
    .await;

    match result {
        Ok(record) => {
            let scope = event_scope(event_id);
            broadcast_to_scope(&state.registry, &scope, &ServerFrame::Message { message: record });
        }
        Err(err) => send_op_error(conn, err),
    }
}

/// `direct-message`: persist, echo to the sender, deliver to the recipient
/// if online. Offline recipients get nothing at send time — they pick the
/// message up through history fetch on their next load.
pub async fn handle_direct_message(
    state: &AppState,
    conn: &ConnectionHandle,
    recipient_id: String,
    content: Option<String>,
    file_url: Option<String>,
    file_name: Option<String>,
) {
    let has_text = content.as_deref().is_some_and(|c| !c.trim().is_empty());
    if !has_text && file_url.is_none() {
        send_op_error(conn, OpError::Invalid("Message requires content or a file"));
        return;
    }
    if let Some(text) = content.as_deref() {
        if text.len() > MAX_CONTENT_LENGTH {
            send_op_error(conn, OpError::Invalid("Message content too long"));
            return;
        }
    }

    let user_id = conn.user_id.clone();
    let rid = recipient_id.clone();

    let result = with_store(state, move |db| {
        if users::find_profile(db, &rid)?.is_none() {
            return Err(OpError::NotFound("Recipient not found"));
        }
        Ok(store::create_direct_message(
            db,
            &user_id,
            &rid,
            content.as_deref().filter(|c| !c.trim().is_empty()),
            file_url.as_deref(),
            file_name.as_deref(),
        )?)
    })
    .await;

    match result {
        Ok(record) => {
            let frame = ServerFrame::DirectMessage { message: record };
            // Echo to the sender's own connection for confirmation
            send_to_conn(&conn.tx, &frame);
            if recipient_id != conn.user_id {
                // Silent when offline — no queuing at this layer
                send_to_user(&state.registry, &recipient_id, &frame);
            }
        }
        Err(err) => send_op_error(conn, err),
    }
}

/// `group-message`: membership is re-checked on every message (a member
/// removed mid-session stops sending immediately), then the message is
/// delivered to every group member who is currently online, addressed by
/// identity rather than joined state.
pub async fn handle_group_message(
    state: &AppState,
    conn: &ConnectionHandle,
    group_id: String,
    content: String,
) {
    if let Err(err) = validate_content(&content) {
        send_op_error(conn, err);
        return;
    }

    let user_id = conn.user_id.clone();
    let gid = group_id.clone();

    let result = with_store(state, move |db| {
        if !access::is_group_member(db, &user_id, &gid)? {
            return Err(OpError::Denied("Not a member of this group"));
        }
        let record = store::create_group_message(db, &gid, &user_id, &content)?;
        let members = access::group_member_ids(db, &gid)?;
        Ok((record, members))
    })
    .await;

    match result {
        Ok((record, members)) => {
            let frame = ServerFrame::GroupMessage { message: record };
            send_to_users(&state.registry, &members, &frame);
        }
        Err(err) => send_op_error(conn, err),
    }
}

/// `event-group-message`: like a group message, but scoped to an event
/// planning group whose access is re-checked per message.
pub async fn handle_event_group_message(
    state: &AppState,
    conn: &ConnectionHandle,
    group_id: String,
    content: String,
) {
    if let Err(err) = validate_content(&content) {
        send_op_error(conn, err);
        return;
    }

    let user_id = conn.user_id.clone();
    let gid = group_id.clone();

    let result = with_store(state, move |db| {
        let event_id = access::event_id_of_group(db, &gid)?
            .ok_or(OpError::NotFound("Planning group not found"))?;
        if !access::is_event_group_member(db, &user_id, &gid)? {
            return Err(OpError::Denied("Not a member of this planning group"));
        }
        let record = store::create_event_group_message(db, &gid, &event_id, &user_id, &content)?;
        let members = access::event_group_member_ids(db, &gid)?;
        Ok((record, members))
    })
    .await;

    match result {
        Ok((record, members)) => {
            let frame = ServerFrame::EventGroupMessage { message: record };
            send_to_users(&state.registry, &members, &frame);
        }
        Err(err) => send_op_error(conn, err),
    }
}
