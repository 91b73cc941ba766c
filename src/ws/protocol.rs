//! Inbound frame dispatch: parse the JSON frame, then route to the
//! message router (chat) or the signaling relay (call).

use crate::call::signaling;
use crate::chat::messages;
use crate::state::AppState;
use crate::ws::broadcast::send_to_conn;
use crate::ws::frames::{ClientFrame, ServerFrame};
use crate::ws::registry::ConnectionHandle;

/// Handle one inbound text frame from an authenticated connection.
///
/// `joined_event` is the reader loop's record of the event room this
/// connection is currently joined to; only `join` mutates it.
pub async fn handle_text_frame(
    text: &str,
    conn: &ConnectionHandle,
    state: &AppState,
    joined_event: &mut Option<String>,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(user_id = %conn.user_id, error = %e, "Failed to parse frame");
            send_to_conn(
                &conn.tx,
                &ServerFrame::Error {
                    code: 400,
                    message: format!("Invalid frame: {e}"),
                },
            );
            return;
        }
    };

    match frame {
        ClientFrame::Join { event_id } => {
            messages::handle_join(state, conn, joined_event, event_id).await;
        }
        ClientFrame::Message { content } => {
            messages::handle_room_message(state, conn, joined_event.as_deref(), content).await;
        }
        ClientFrame::DirectMessage {
            recipient_id,
            content,
            file_url,
            file_name,
        } => {
            messages::handle_direct_message(state, conn, recipient_id, content, file_url, file_name)
                .await;
        }
        ClientFrame::GroupMessage { group_id, content } => {
            messages::handle_group_message(state, conn, group_id, content).await;
        }
        ClientFrame::EventGroupMessage { group_id, content } => {
            messages::handle_event_group_message(state, conn, group_id, content).await;
        }
        ClientFrame::CallOffer {
            recipient_id,
            offer,
            call_type,
        } => {
            signaling::handle_call_offer(state, conn, recipient_id, offer, call_type).await;
        }
        ClientFrame::CallAnswer { caller_id, answer } => {
            signaling::handle_call_answer(state, conn, caller_id, answer);
        }
        ClientFrame::CallIceCandidate {
            target_id,
            candidate,
        } => {
            signaling::handle_call_ice_candidate(state, conn, target_id, candidate);
        }
        ClientFrame::CallReject { caller_id } => {
            signaling::handle_call_reject(state, conn, caller_id);
        }
        ClientFrame::CallEnd { peer_id } => {
            signaling::handle_call_end(state, conn, peer_id);
        }
    }
}
