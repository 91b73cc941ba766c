//! Call-setup signaling relay.
//!
//! Each handler is one independent hop: look up the target's live
//! connection in the direct-addressing map and forward the payload
//! verbatim with the sender's identity attached. The server tracks no
//! call state — ringing/accepted/ended is reconstructed by the two
//! endpoints from the frame sequence, which keeps a second concurrent
//! state machine out of the relay.

use serde_json::Value;

use crate::db::{users, StoreError};
use crate::state::AppState;
use crate::ws::broadcast::{send_to_conn, send_to_user};
use crate::ws::frames::ServerFrame;
use crate::ws::registry::ConnectionHandle;

/// `call-offer`: ring the recipient if online; otherwise the caller gets
/// exactly one `call-failed` reply and nothing else happens.
pub async fn handle_call_offer(
    state: &AppState,
    conn: &ConnectionHandle,
    recipient_id: String,
    offer: Value,
    call_type: String,
) {
    let Some(target) = state.registry.find(&recipient_id) else {
        send_to_conn(
            &conn.tx,
            &ServerFrame::CallFailed {
                target_id: recipient_id,
                reason: "User is not online".to_string(),
            },
        );
        return;
    };

    // Denormalize the caller's display data so the callee can render the
    // incoming-call screen without a lookup of its own.
    let db = state.db.clone();
    let user_id = conn.user_id.clone();
    let sender = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
        users::get_profile(&conn, &user_id)
    })
    .await;

    match sender {
        Ok(Ok(sender)) => {
            tracing::debug!(
                caller = %conn.user_id,
                callee = %target.user_id,
                call_type = %call_type,
                "Relaying call offer"
            );
            send_to_conn(
                &target.tx,
                &ServerFrame::CallOffer {
                    sender,
                    offer,
                    call_type,
                },
            );
        }
        _ => {
            send_to_conn(
                &conn.tx,
                &ServerFrame::Error {
                    code: 500,
                    message: "Internal storage error".to_string(),
                },
            );
        }
    }
}

/// `call-answer`: relay the SDP answer back to the caller.
pub fn handle_call_answer(
    state: &AppState,
    conn: &ConnectionHandle,
    caller_id: String,
    answer: Value,
) {
    send_to_user(
        &state.registry,
        &caller_id,
        &ServerFrame::CallAnswer {
            sender_id: conn.user_id.clone(),
            answer,
        },
    );
}

/// `call-ice-candidate`: relay an ICE candidate to the target peer.
pub fn handle_call_ice_candidate(
    state: &AppState,
    conn: &ConnectionHandle,
    target_id: String,
    candidate: Value,
) {
    send_to_user(
        &state.registry,
        &target_id,
        &ServerFrame::CallIceCandidate {
            sender_id: conn.user_id.clone(),
            candidate,
        },
    );
}

/// `call-reject`: tell the caller their offer was declined.
pub fn handle_call_reject(state: &AppState, conn: &ConnectionHandle, caller_id: String) {
    send_to_user(
        &state.registry,
        &caller_id,
        &ServerFrame::CallRejected {
            sender_id: conn.user_id.clone(),
        },
    );
}

/// `call-end`: tell the peer the call is over. A peer that already
/// disconnected needs no notification, so offline targets are dropped.
pub fn handle_call_end(state: &AppState, conn: &ConnectionHandle, peer_id: String) {
    send_to_user(
        &state.registry,
        &peer_id,
        &ServerFrame::CallEnded {
            sender_id: conn.user_id.clone(),
        },
    );
}
