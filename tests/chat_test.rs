//! Integration tests for the chat scopes: event rooms with presence,
//! direct messages, group chats, and event planning groups.

use chrono::Duration as ChronoDuration;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use gatherly_server::auth::session::sign;
use gatherly_server::db::{self, access, messages, users, DbPool};
use gatherly_server::state::AppState;
use gatherly_server::ws::registry::Registry;

const SECRET: &[u8] = b"test-cookie-secret";

struct TestServer {
    addr: SocketAddr,
    db: DbPool,
    _tmp: tempfile::TempDir,
}

async fn start_test_server() -> TestServer {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let data_dir = tmp.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("init db");

    let state = AppState {
        db: db.clone(),
        registry: Arc::new(Registry::new()),
        session_secret: SECRET.to_vec(),
        session_cookie: "connect.sid".to_string(),
    };

    let app = gatherly_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, db, _tmp: tmp }
}

fn seed_user(server: &TestServer, user_id: &str, display_name: &str) -> String {
    let conn = server.db.lock().unwrap();
    users::create_user(&conn, user_id, display_name, None).unwrap();
    let sid = format!("sid-{user_id}");
    db::sessions::create_session(&conn, &sid, user_id, ChronoDuration::hours(1)).unwrap();
    sid
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: SocketAddr, sid: &str) -> WsStream {
    let cookie = sign(sid, SECRET);
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    request.headers_mut().insert(
        "Cookie",
        format!("connect.sid={cookie}").parse().unwrap(),
    );
    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("websocket connect");
    stream
}

async fn send_frame(stream: &mut WsStream, frame: Value) {
    stream
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Receive the next JSON text frame, skipping control frames.
async fn recv_json(stream: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("stream error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("frame is JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert no text frame arrives within a short window.
async fn expect_silence(stream: &mut WsStream) {
    let result = tokio::time::timeout(Duration::from_millis(400), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await;
    if let Ok(frame) = result {
        panic!("expected no frame, got: {frame:?}");
    }
}

fn presence_ids(frame: &Value) -> HashSet<String> {
    frame["users"]
        .as_array()
        .expect("users array")
        .iter()
        .map(|u| u["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn join_acks_and_broadcasts_presence() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    {
        let conn = server.db.lock().unwrap();
        access::create_event(&conn, "e1", "Launch party").unwrap();
        access::add_event_member(&conn, "e1", "u1").unwrap();
        access::add_event_member(&conn, "e1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(&mut a, json!({"type": "join", "eventId": "e1"})).await;

    let joined = recv_json(&mut a).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["eventId"], "e1");

    let presence = recv_json(&mut a).await;
    assert_eq!(presence["type"], "presence");
    assert_eq!(presence_ids(&presence), HashSet::from(["u1".to_string()]));

    // Second member joins; both connections get the two-user snapshot
    let mut b = connect(server.addr, &sid_b).await;
    send_frame(&mut b, json!({"type": "join", "eventId": "e1"})).await;

    let joined_b = recv_json(&mut b).await;
    assert_eq!(joined_b["type"], "joined");
    let presence_b = recv_json(&mut b).await;
    assert_eq!(
        presence_ids(&presence_b),
        HashSet::from(["u1".to_string(), "u2".to_string()])
    );

    let presence_a = recv_json(&mut a).await;
    assert_eq!(presence_a["type"], "presence");
    assert_eq!(
        presence_ids(&presence_a),
        HashSet::from(["u1".to_string(), "u2".to_string()])
    );

    // Disconnect shrinks the snapshot for the remaining member
    drop(b);
    let presence_a = recv_json(&mut a).await;
    assert_eq!(presence_a["type"], "presence");
    assert_eq!(presence_ids(&presence_a), HashSet::from(["u1".to_string()]));
}

#[tokio::test]
async fn join_denied_without_event_membership() {
    let server = start_test_server().await;
    let sid = seed_user(&server, "u1", "Ada");
    {
        let conn = server.db.lock().unwrap();
        access::create_event(&conn, "e1", "Launch party").unwrap();
    }

    let mut a = connect(server.addr, &sid).await;
    send_frame(&mut a, json!({"type": "join", "eventId": "e1"})).await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 403);
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn room_message_broadcasts_and_persists() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    {
        let conn = server.db.lock().unwrap();
        access::create_event(&conn, "e1", "Launch party").unwrap();
        access::add_event_member(&conn, "e1", "u1").unwrap();
        access::add_event_member(&conn, "e1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(&mut a, json!({"type": "join", "eventId": "e1"})).await;
    recv_json(&mut a).await; // joined
    recv_json(&mut a).await; // presence

    let mut b = connect(server.addr, &sid_b).await;
    send_frame(&mut b, json!({"type": "join", "eventId": "e1"})).await;
    recv_json(&mut b).await; // joined
    recv_json(&mut b).await; // presence
    recv_json(&mut a).await; // presence update

    send_frame(&mut a, json!({"type": "message", "content": "doors at 7"})).await;

    for stream in [&mut a, &mut b] {
        let frame = recv_json(stream).await;
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["message"]["content"], "doors at 7");
        assert_eq!(frame["message"]["sender"]["id"], "u1");
        assert_eq!(frame["message"]["eventId"], "e1");
        assert!(frame["message"]["id"].is_string());
        assert!(frame["message"]["createdAt"].is_string());
    }

    let conn = server.db.lock().unwrap();
    let history = messages::event_history(&conn, "e1", 50).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "doors at 7");
}

#[tokio::test]
async fn room_message_without_join_is_an_error() {
    let server = start_test_server().await;
    let sid = seed_user(&server, "u1", "Ada");

    let mut a = connect(server.addr, &sid).await;
    send_frame(&mut a, json!({"type": "message", "content": "hello"})).await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 400);
}

#[tokio::test]
async fn direct_message_echoes_to_sender_and_reaches_recipient() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");

    let mut a = connect(server.addr, &sid_a).await;
    let mut b = connect(server.addr, &sid_b).await;

    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u2", "content": "lunch?"}),
    )
    .await;

    let echo = recv_json(&mut a).await;
    assert_eq!(echo["type"], "direct-message");
    assert_eq!(echo["message"]["content"], "lunch?");
    assert_eq!(echo["message"]["sender"]["id"], "u1");

    let delivery = recv_json(&mut b).await;
    assert_eq!(delivery["type"], "direct-message");
    assert_eq!(delivery["message"]["id"], echo["message"]["id"]);
}

#[tokio::test]
async fn direct_message_to_offline_recipient_is_persisted() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    seed_user(&server, "u2", "Ben");

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u2", "fileUrl": "/files/menu.pdf", "fileName": "menu.pdf"}),
    )
    .await;

    let echo = recv_json(&mut a).await;
    assert_eq!(echo["type"], "direct-message");
    assert_eq!(echo["message"]["fileName"], "menu.pdf");
    assert!(echo["message"].get("content").is_none() || echo["message"]["content"].is_null());

    let conn = server.db.lock().unwrap();
    let history = messages::direct_history(&conn, "u1", "u2", 50).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].file_url.as_deref(), Some("/files/menu.pdf"));
}

#[tokio::test]
async fn direct_message_requires_content_or_file() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    seed_user(&server, "u2", "Ben");

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u2"}),
    )
    .await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 400);

    let conn = server.db.lock().unwrap();
    assert!(messages::direct_history(&conn, "u1", "u2", 50).unwrap().is_empty());
}

#[tokio::test]
async fn direct_message_to_unknown_recipient_is_not_found() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "ghost", "content": "hi"}),
    )
    .await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 404);
}

#[tokio::test]
async fn group_message_reaches_members_only() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    let sid_c = seed_user(&server, "u3", "Cy");
    {
        let conn = server.db.lock().unwrap();
        access::create_group(&conn, "g1", "Caterers").unwrap();
        access::add_group_member(&conn, "g1", "u1").unwrap();
        access::add_group_member(&conn, "g1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    let mut b = connect(server.addr, &sid_b).await;
    let mut c = connect(server.addr, &sid_c).await;

    send_frame(
        &mut a,
        json!({"type": "group-message", "groupId": "g1", "content": "tasting friday"}),
    )
    .await;

    for stream in [&mut a, &mut b] {
        let frame = recv_json(stream).await;
        assert_eq!(frame["type"], "group-message");
        assert_eq!(frame["message"]["groupId"], "g1");
        assert_eq!(frame["message"]["content"], "tasting friday");
    }
    expect_silence(&mut c).await;
}

#[tokio::test]
async fn group_message_denied_for_non_member() {
    let server = start_test_server().await;
    let sid_c = seed_user(&server, "u3", "Cy");
    {
        let conn = server.db.lock().unwrap();
        users::create_user(&conn, "u1", "Ada", None).unwrap();
        access::create_group(&conn, "g1", "Caterers").unwrap();
        access::add_group_member(&conn, "g1", "u1").unwrap();
    }

    let mut c = connect(server.addr, &sid_c).await;
    send_frame(
        &mut c,
        json!({"type": "group-message", "groupId": "g1", "content": "let me in"}),
    )
    .await;

    let err = recv_json(&mut c).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 403);

    let conn = server.db.lock().unwrap();
    assert!(messages::group_history(&conn, "g1", 50).unwrap().is_empty());
}

#[tokio::test]
async fn revoked_event_access_blocks_next_room_message() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    {
        let conn = server.db.lock().unwrap();
        access::create_event(&conn, "e1", "Launch party").unwrap();
        access::add_event_member(&conn, "e1", "u1").unwrap();
        access::add_event_member(&conn, "e1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(&mut a, json!({"type": "join", "eventId": "e1"})).await;
    recv_json(&mut a).await; // joined
    recv_json(&mut a).await; // presence

    let mut b = connect(server.addr, &sid_b).await;
    send_frame(&mut b, json!({"type": "join", "eventId": "e1"})).await;
    recv_json(&mut b).await; // joined
    recv_json(&mut b).await; // presence
    recv_json(&mut a).await; // presence update

    // While still joined, the sender works
    send_frame(&mut a, json!({"type": "message", "content": "still here"})).await;
    recv_json(&mut a).await;
    recv_json(&mut b).await;

    // Revoke membership under the live connection
    {
        let conn = server.db.lock().unwrap();
        access::remove_event_member(&conn, "e1", "u1").unwrap();
    }

    // The very next message on the same socket is refused
    send_frame(&mut a, json!({"type": "message", "content": "locked out"})).await;
    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 403);
    expect_silence(&mut b).await;

    let conn = server.db.lock().unwrap();
    let history = messages::event_history(&conn, "e1", 50).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "still here");
}

#[tokio::test]
async fn revoked_group_membership_blocks_next_message() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    {
        let conn = server.db.lock().unwrap();
        access::create_group(&conn, "g1", "Caterers").unwrap();
        access::add_group_member(&conn, "g1", "u1").unwrap();
        access::add_group_member(&conn, "g1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    let mut b = connect(server.addr, &sid_b).await;

    send_frame(
        &mut a,
        json!({"type": "group-message", "groupId": "g1", "content": "first"}),
    )
    .await;
    recv_json(&mut a).await;
    recv_json(&mut b).await;

    {
        let conn = server.db.lock().unwrap();
        access::remove_group_member(&conn, "g1", "u1").unwrap();
    }

    send_frame(
        &mut a,
        json!({"type": "group-message", "groupId": "g1", "content": "second"}),
    )
    .await;
    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 403);
    expect_silence(&mut b).await;

    let conn = server.db.lock().unwrap();
    let history = messages::group_history(&conn, "g1", 50).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "first");
}

#[tokio::test]
async fn deleted_sender_account_is_not_found() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    seed_user(&server, "u2", "Ben");

    let mut a = connect(server.addr, &sid_a).await;

    // Account removed while the session and socket are still live
    {
        let conn = server.db.lock().unwrap();
        conn.execute("DELETE FROM users WHERE id = 'u1'", []).unwrap();
    }

    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u2", "content": "hi"}),
    )
    .await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 404);

    let conn = server.db.lock().unwrap();
    assert!(messages::direct_history(&conn, "u1", "u2", 50).unwrap().is_empty());
}

#[tokio::test]
async fn event_group_message_carries_parent_event_and_persists() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    let sid_b = seed_user(&server, "u2", "Ben");
    {
        let conn = server.db.lock().unwrap();
        access::create_event(&conn, "e1", "Launch party").unwrap();
        access::create_event_group(&conn, "eg1", "e1", "Logistics").unwrap();
        access::add_event_group_member(&conn, "eg1", "u1").unwrap();
        access::add_event_group_member(&conn, "eg1", "u2").unwrap();
    }

    let mut a = connect(server.addr, &sid_a).await;
    let mut b = connect(server.addr, &sid_b).await;

    send_frame(
        &mut a,
        json!({"type": "event-group-message", "groupId": "eg1", "content": "hello"}),
    )
    .await;

    for stream in [&mut a, &mut b] {
        let frame = recv_json(stream).await;
        assert_eq!(frame["type"], "event-group-message");
        assert_eq!(frame["message"]["groupId"], "eg1");
        assert_eq!(frame["message"]["eventId"], "e1");
        assert_eq!(frame["message"]["sender"]["id"], "u1");
        assert_eq!(frame["message"]["content"], "hello");
    }

    let conn = server.db.lock().unwrap();
    let history = messages::event_group_history(&conn, "eg1", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_id, "e1");
}

#[tokio::test]
async fn event_group_message_to_unknown_group_is_not_found() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");

    let mut a = connect(server.addr, &sid_a).await;
    send_frame(
        &mut a,
        json!({"type": "event-group-message", "groupId": "nope", "content": "hi"}),
    )
    .await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 404);
}

#[tokio::test]
async fn malformed_frame_gets_exactly_one_error() {
    let server = start_test_server().await;
    let sid = seed_user(&server, "u1", "Ada");

    let mut a = connect(server.addr, &sid).await;
    a.send(Message::Text("{not json".to_string().into()))
        .await
        .expect("send");

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 400);
    expect_silence(&mut a).await;

    // Connection is still usable afterwards
    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u1", "content": "note to self"}),
    )
    .await;
    let echo = recv_json(&mut a).await;
    assert_eq!(echo["type"], "direct-message");
}

#[tokio::test]
async fn oversized_content_is_rejected() {
    let server = start_test_server().await;
    let sid_a = seed_user(&server, "u1", "Ada");
    seed_user(&server, "u2", "Ben");

    let mut a = connect(server.addr, &sid_a).await;
    let huge = "x".repeat(4001);
    send_frame(
        &mut a,
        json!({"type": "direct-message", "recipientId": "u2", "content": huge}),
    )
    .await;

    let err = recv_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], 400);
}
