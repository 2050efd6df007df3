// tests/client_http.rs
// Exercises the HTTP client against an in-process fake chat server.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use teahaz_client::{
    client::codec::encode_text, ApiError, ChatClient, ClientConfig, Credentials, MonitorConfig,
    MonitorExit, Payload, Session, TickOutcome,
};

const ROOM: &str = "room-1";
const COOKIE: &str = "cookie-abc";
const PASSWORD: &str = "1234567890";

#[derive(Default)]
struct FakeServer {
    messages: Vec<Value>,
    requested_times: Vec<String>,
    fetches: usize,
    next_id: usize,
}

type Shared = Arc<Mutex<FakeServer>>;

fn now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn with_cookie(room: &str, body: Value) -> Response {
    (
        [(header::SET_COOKIE, format!("{room}={COOKIE}; HttpOnly; Path=/"))],
        Json(body),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap, room: &str) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("{room}={COOKIE}"))
}

async fn create_chatroom(Json(body): Json<Value>) -> Response {
    with_cookie(
        ROOM,
        json!({
            "userID": "user-1",
            "chatroomID": ROOM,
            "chatroom_name": body["chatroom_name"],
            "channelID": "channel-1",
        }),
    )
}

async fn login(Path(room): Path<String>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, "wrong password").into_response();
    }
    if room == "cookieless" {
        return Json(json!({})).into_response();
    }
    with_cookie(&room, json!({ "userID": body["userID"], "username": "a" }))
}

async fn use_invite(Path(room): Path<String>, Json(body): Json<Value>) -> Response {
    if body["inviteId"] != "invite-7" {
        return (StatusCode::FORBIDDEN, "invalid invite").into_response();
    }
    with_cookie(&room, json!({ "userID": "user-2", "channelID": "channel-1" }))
}

async fn send_message(
    State(st): State<Shared>,
    Path(room): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers, &room) {
        return (StatusCode::UNAUTHORIZED, "no session").into_response();
    }
    let mut st = st.lock();
    st.next_id += 1;
    let stored = json!({
        "messageId": format!("m{}", st.next_id),
        "time": now(),
        "type": body["type"],
        "message": body["message"],
        "username": body["username"],
    });
    st.messages.push(stored.clone());
    Json(stored).into_response()
}

async fn get_messages(
    State(st): State<Shared>,
    Path(room): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut st = st.lock();
    st.fetches += 1;
    if !authorized(&headers, &room) {
        return (StatusCode::UNAUTHORIZED, "no session").into_response();
    }
    let raw = q.get("time").cloned().unwrap_or_default();
    st.requested_times.push(raw.clone());
    let since: f64 = raw.parse().unwrap_or(0.0);
    let out: Vec<Value> = st
        .messages
        .iter()
        .filter(|m| m["time"].as_f64().unwrap_or(0.0) >= since)
        .cloned()
        .collect();
    Json(out).into_response()
}

async fn spawn_server() -> (ChatClient, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeServer::default()));
    let app = Router::new()
        .route("/api/v0/chatroom/", post(create_chatroom))
        .route("/api/v0/login/{room}", post(login))
        .route("/api/v0/invite/{room}", post(use_invite))
        .route(
            "/api/v0/message/{room}",
            post(send_message).get(get_messages),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let cfg = ClientConfig::new(format!("http://{addr}")).unwrap();
    (ChatClient::new(&cfg).unwrap(), state)
}

fn creds() -> Credentials {
    Credentials::new("a", PASSWORD)
}

#[tokio::test]
async fn create_chatroom_captures_session() {
    let (client, _) = spawn_server().await;
    let s = client.create_chatroom(&creds(), "conv1").await.unwrap();
    assert_eq!(s.chatroom_id, ROOM);
    assert_eq!(s.cookie(), COOKIE);
    assert_eq!(s.user_id.as_deref(), Some("user-1"));
    assert_eq!(s.username.as_deref(), Some("a"));
    assert_eq!(s.chat_name.as_deref(), Some("conv1"));
    assert_eq!(s.channels, vec!["channel-1".to_string()]);
}

#[tokio::test]
async fn login_and_invite() {
    let (client, _) = spawn_server().await;

    let s = client.login(ROOM, "user-1", PASSWORD).await.unwrap();
    assert_eq!(s.cookie(), COOKIE);
    assert_eq!(s.user_id.as_deref(), Some("user-1"));

    let err = client.login(ROOM, "user-1", "nope").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let invited = client.use_invite(ROOM, "invite-7", &creds()).await.unwrap();
    assert_eq!(invited.user_id.as_deref(), Some("user-2"));
    assert_eq!(invited.username.as_deref(), Some("a"));

    let err = client.use_invite(ROOM, "invite-0", &creds()).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[tokio::test]
async fn login_without_cookie_is_an_auth_failure() {
    let (client, _) = spawn_server().await;
    let err = client
        .login("cookieless", "user-1", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[tokio::test]
async fn send_then_fetch_decodes_messages() {
    let (client, state) = spawn_server().await;
    let s = client.login(ROOM, "user-1", PASSWORD).await.unwrap();

    client.send_message(&s, "Good afternoon!").await.unwrap();
    state.lock().messages.push(json!({
        "messageId": "sys-1",
        "time": now(),
        "type": "system",
        "message": encode_text(r#"{"action":"user_joined","username":"b"}"#),
    }));

    let events = client.fetch_recent(&s).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].payload, Payload::Text("Good afternoon!".into()));
    assert_eq!(events[0].username.as_deref(), Some("a"));
    assert_eq!(
        events[1].payload,
        Payload::Structured(json!({"action": "user_joined", "username": "b"}))
    );
}

#[tokio::test]
async fn empty_message_is_rejected_locally() {
    let (client, state) = spawn_server().await;
    let s = client.login(ROOM, "user-1", PASSWORD).await.unwrap();
    let err = client.send_message(&s, "").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)));
    assert!(state.lock().messages.is_empty());
}

#[tokio::test]
async fn since_time_is_passed_through_verbatim() {
    let (client, state) = spawn_server().await;
    let s = client.login(ROOM, "user-1", PASSWORD).await.unwrap();

    client.fetch_since(&s, -30.0).await.unwrap();
    client.fetch_since(&s, 1_700_000_000.5).await.unwrap();
    let err = client.fetch_since(&s, f64::NAN).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)));

    let st = state.lock();
    assert_eq!(st.fetches, 2);
    let times: Vec<f64> = st
        .requested_times
        .iter()
        .map(|t| t.parse().unwrap())
        .collect();
    assert_eq!(times, vec![-30.0, 1_700_000_000.5]);
}

#[tokio::test]
async fn bad_session_surfaces_as_unauthorized() {
    let (client, _) = spawn_server().await;
    let stale = Session::new(ROOM, "expired");
    let err = client.fetch_since(&stale, 0.0).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[tokio::test]
async fn monitor_delivers_only_new_messages() {
    let (client, _) = spawn_server().await;
    let s = client.login(ROOM, "user-1", PASSWORD).await.unwrap();
    client.send_message(&s, "one").await.unwrap();
    client.send_message(&s, "two").await.unwrap();

    let mut m = client.monitor(s.clone(), MonitorConfig::default());
    let Some(TickOutcome::Delivered(first)) = m.tick().await else {
        panic!("expected first delivery");
    };
    assert_eq!(first.fresh_count(), 2);

    client.send_message(&s, "three").await.unwrap();
    let Some(TickOutcome::Delivered(second)) = m.tick().await else {
        panic!("expected second delivery");
    };
    assert_eq!(second.events().len(), 3);
    let fresh: Vec<_> = second
        .fresh()
        .filter_map(|e| e.payload.as_text())
        .collect();
    assert_eq!(fresh, vec!["three"]);

    assert!(matches!(m.tick().await, Some(TickOutcome::Quiet { fetched: 3, .. })));
}

#[tokio::test]
async fn monitor_stops_on_auth_failure_when_configured() {
    let (client, _) = spawn_server().await;
    let cfg = MonitorConfig::default().with_stop_on_failure(true);
    let m = client.monitor(Session::new(ROOM, "expired"), cfg);

    let mut failures = 0;
    let exit = m.run(|_| {}, |_| failures += 1).await;
    assert!(matches!(exit, MonitorExit::Failed(ApiError::Unauthorized(_))));
    assert_eq!(failures, 1);
}
