//! Sessions against a real WebSocket server on localhost

use beacon_core::{
    EventKind, LifecycleEvent, LifecycleState, PayloadEvent, SessionEvent, SessionOptions,
};
use beacon_runtime::{SessionBuilder, SessionHandle};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const LIMIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_one(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = timeout(LIMIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_json(socket: &mut ServerSocket) -> Value {
    loop {
        match timeout(LIMIT, socket.next()).await.unwrap() {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("server expected a text frame, got {other:?}"),
        }
    }
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(LIMIT, events.recv()).await.unwrap().unwrap()
}

fn create_test_session(url: &str) -> SessionHandle {
    let options = SessionOptions::new(url)
        .with_token("secret")
        .with_client_id("client-e2e")
        .with_heartbeat_interval_ms(0);
    SessionBuilder::new(options).spawn().unwrap()
}

#[tokio::test]
async fn test_auth_frame_carries_credential() {
    let (listener, url) = bind_server().await;
    let handle = create_test_session(&url);

    let mut socket = accept_one(&listener).await;
    let auth = next_json(&mut socket).await;
    assert_eq!(auth["type"], "auth");
    assert_eq!(auth["payload"]["token"], "secret");
    assert_eq!(auth["payload"]["clientId"], "client-e2e");
    assert!(auth["id"].is_string());

    timeout(LIMIT, handle.wait_for_state(LifecycleState::Connected))
        .await
        .unwrap()
        .unwrap();
    handle.destroy().await;
}

#[tokio::test]
async fn test_server_heartbeat_is_acknowledged() {
    let (listener, url) = bind_server().await;
    let handle = create_test_session(&url);

    let mut socket = accept_one(&listener).await;
    next_json(&mut socket).await;
    socket
        .send(Message::Text(json!({"type": "heartbeat"}).to_string()))
        .await
        .unwrap();

    let ack = next_json(&mut socket).await;
    assert_eq!(ack["type"], "heartbeat_ack");
    assert!(ack["payload"]["timestamp"].is_u64());
    handle.destroy().await;
}

#[tokio::test]
async fn test_notifications_and_outbound_messages() {
    let (listener, url) = bind_server().await;
    let handle = create_test_session(&url);
    let mut events = handle.events(&[EventKind::Notification, EventKind::AuthSuccess]);

    let mut socket = accept_one(&listener).await;
    next_json(&mut socket).await;
    socket
        .send(Message::Text(
            json!({"type": "auth_success", "payload": {"user": "u1"}}).to_string(),
        ))
        .await
        .unwrap();
    socket
        .send(Message::Text(
            json!({"id": "m-7", "type": "notification", "payload": {"text": "hello"}})
                .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::from(PayloadEvent::AuthSuccess(Some(json!({"user": "u1"}))))
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::from(PayloadEvent::Notification(json!({"text": "hello"})))
    );

    handle
        .send_notification(json!({"text": "reply"}))
        .await
        .unwrap();
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "notification");
    assert_eq!(reply["payload"]["text"], "reply");
    handle.destroy().await;
}

#[tokio::test]
async fn test_normal_server_close_does_not_reconnect() {
    let (listener, url) = bind_server().await;
    let handle = create_test_session(&url);
    let mut events = handle.events(&[EventKind::Disconnected, EventKind::Reconnecting]);

    let mut socket = accept_one(&listener).await;
    next_json(&mut socket).await;
    socket
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed("maintenance"),
        }))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::from(LifecycleEvent::Disconnected {
            code: 1000,
            reason: "maintenance".to_string()
        })
    );
    assert!(timeout(Duration::from_millis(1500), listener.accept())
        .await
        .is_err());
    assert_eq!(handle.state(), LifecycleState::Disconnected);
    handle.destroy().await;
}

#[tokio::test]
async fn test_abnormal_drop_reconnects() {
    let (listener, url) = bind_server().await;
    let handle = create_test_session(&url);

    let socket = accept_one(&listener).await;
    drop(socket);

    let mut second = accept_one(&listener).await;
    let auth = next_json(&mut second).await;
    assert_eq!(auth["type"], "auth");
    handle.destroy().await;
}

#[tokio::test]
async fn test_unreachable_server_reports_error_and_retries() {
    let (listener, url) = bind_server().await;
    drop(listener);

    let options = SessionOptions::new(&url)
        .with_token("secret")
        .with_client_id("client-e2e")
        .with_heartbeat_interval_ms(0)
        .with_auto_connect(false);
    let handle = SessionBuilder::new(options).spawn().unwrap();
    let mut events = handle.events(&[EventKind::Error, EventKind::Reconnecting]);
    handle.connect();

    let first = next_event(&mut events).await;
    assert!(matches!(first, SessionEvent::Lifecycle(LifecycleEvent::Error(_))));
    let second = next_event(&mut events).await;
    assert!(matches!(
        second,
        SessionEvent::Lifecycle(LifecycleEvent::Reconnecting { attempt: 1, .. })
    ));
    handle.destroy().await;
}
