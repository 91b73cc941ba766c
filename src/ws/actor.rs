use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat::presence;
use crate::state::AppState;
use crate::ws::broadcast::send_to_conn;
use crate::ws::frames::ServerFrame;
use crate::ws::protocol;
use crate::ws::registry::ConnectionHandle;

/// Ping interval: server sends WebSocket ping every 30 seconds.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code sent to a connection displaced by a newer one for the same user.
const CLOSE_REPLACED: u16 = 4000;

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to send messages to this
/// client by cloning the sender (that clone is what the registry stores).
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let handle = ConnectionHandle::new(user_id.clone(), tx.clone());
    let conn_id = handle.conn_id;

    // Register in the direct-addressing map; close any connection this one
    // replaces so a frame is never delivered to both (last-writer-wins).
    if let Some(evicted) = state.registry.register(handle.clone()) {
        tracing::debug!(user_id = %user_id, "Evicting previous connection");
        let _ = evicted.tx.send(Message::Close(Some(CloseFrame {
            code: CLOSE_REPLACED,
            reason: "Replaced by newer connection".into(),
        })));
    }

    tracing::info!(user_id = %user_id, conn_id = conn_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // The event room this connection is currently joined to, if any.
    // Owned by the reader loop; the registry holds the authoritative set.
    let mut joined_event: Option<String> = None;

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_frame(&text, &handle, &state, &mut joined_event).await;
                }
                Message::Binary(_) => {
                    // The protocol is JSON text frames
                    tracing::debug!(user_id = %user_id, "Ignoring unexpected binary frame");
                    send_to_conn(
                        &tx,
                        &ServerFrame::Error {
                            code: 400,
                            message: "Expected a JSON text frame".to_string(),
                        },
                    );
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(user_id = %user_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(user_id = %user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Remove the direct entry (unless a newer connection already owns it)
    // and leave any joined scope, then tell the remaining members.
    let left_scopes = state.registry.unregister(&user_id, conn_id);
    for scope_id in &left_scopes {
        presence::broadcast_scope_presence(&state, scope_id);
    }

    tracing::info!(user_id = %user_id, conn_id = conn_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
