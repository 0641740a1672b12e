//! End-to-end push tests against a bound server: a real WebSocket client
//! connects, and pushes are triggered over the REST API.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use push_gateway::app_state::AppState;
use push_gateway::config::PushConfig;
use push_gateway::domain::ListenerScope;
use push_gateway::executor::ExecutorStrategy;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(config: PushConfig) -> (SocketAddr, AppState) {
    let state = AppState::from_config(&config);
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("cannot bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    let app = push_gateway::router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn open(addr: SocketAddr, path: &str) -> Client {
    let Ok((client, _)) = connect_async(format!("ws://{addr}/ws/{path}")).await else {
        panic!("websocket handshake failed for {path}");
    };
    client
}

/// Registration completes after the handshake response, so wait for it.
async fn wait_for_connections(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.dispatcher.registry().len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} connections, have {}",
        state.dispatcher.registry().len()
    );
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let Ok(response) = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
    else {
        panic!("POST {path} failed");
    };
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let Ok(Some(Ok(message))) =
            tokio::time::timeout(Duration::from_secs(2), client.next()).await
        else {
            panic!("no message received");
        };
        match message {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn broadcast_reaches_websocket_client() {
    let (addr, state) = spawn_server(PushConfig::default()).await;
    let mut client = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;

    let (status, report) = post(
        addr,
        "/api/v1/broadcast",
        json!({
            "message": { "text": "hello" },
            "scope": { "type": "session", "application": "appA", "session_id": "sess1" }
        }),
    )
    .await;

    assert_eq!(status, 202);
    assert_eq!(report["targeted"], 1);
    assert_eq!(next_text(&mut client).await, "hello");
}

#[tokio::test]
async fn json_push_arrives_in_envelope_through_pooled_executor() {
    let config = PushConfig {
        push_executor: ExecutorStrategy::Pooled {
            lanes: 2,
            lane_capacity: 32,
        },
        ..PushConfig::default()
    };
    let (addr, state) = spawn_server(config).await;
    let mut client = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;

    let (status, _) = post(
        addr,
        "/api/v1/connections/appA/sess1/pageX/messages",
        json!({ "message": { "json": { "count": 3 } } }),
    )
    .await;
    assert_eq!(status, 204);

    let Ok(envelope) = serde_json::from_str::<Value>(&next_text(&mut client).await) else {
        panic!("push was not JSON");
    };
    assert_eq!(envelope["type"], "push");
    assert_eq!(envelope["payload"]["count"], 3);
}

#[tokio::test]
async fn closing_the_socket_unregisters_it() {
    let (addr, state) = spawn_server(PushConfig::default()).await;
    let mut client = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;

    let _ = client.close(None).await;
    wait_for_connections(&state, 0).await;

    let (status, body) = post(
        addr,
        "/api/v1/connections/appA/sess1/pageX/messages",
        json!({ "message": { "text": "late" } }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn reconnect_under_same_key_replaces_old_socket() {
    let (addr, state) = spawn_server(PushConfig::default()).await;
    let mut first = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;
    let mut second = open(addr, "appA/sess1/pageX").await;

    // The replaced socket is closed by the server.
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(Ok(message)) = first.next().await {
            if matches!(message, Message::Close(_)) {
                return true;
            }
        }
        true
    })
    .await;
    assert!(matches!(closed, Ok(true)));

    // Its teardown must not evict the new registration.
    tokio::time::sleep(Duration::from_millis(50)).await;
    wait_for_connections(&state, 1).await;

    post(
        addr,
        "/api/v1/broadcast",
        json!({ "message": { "text": "fresh" }, "scope": { "type": "all" } }),
    )
    .await;
    assert_eq!(next_text(&mut second).await, "fresh");
}

#[tokio::test]
async fn session_invalidation_closes_sockets() {
    let (addr, state) = spawn_server(PushConfig::default()).await;
    let mut client = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;

    let Ok(response) = reqwest::Client::new()
        .delete(format!("http://{addr}/api/v1/sessions/appA/sess1"))
        .send()
        .await
    else {
        panic!("DELETE failed");
    };
    assert_eq!(response.status().as_u16(), 200);

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(Ok(message)) = client.next().await {
            if matches!(message, Message::Close(_)) {
                return true;
            }
        }
        true
    })
    .await;
    assert!(matches!(closed, Ok(true)));
    assert!(state.dispatcher.registry().is_empty());
}

#[tokio::test]
async fn client_frames_reach_resource_listeners() {
    let (addr, state) = spawn_server(PushConfig::default()).await;
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    state.dispatcher.listeners().subscribe(
        ListenerScope::Resource(push_gateway::domain::ConnectionKey::new(
            "appA", "sess1", "pageX",
        )),
        move |payload| {
            if let (Ok(mut sink), Some(text)) = (sink.lock(), payload.message().as_text()) {
                sink.push(text.to_string());
            }
        },
    );

    let mut client = open(addr, "appA/sess1/pageX").await;
    wait_for_connections(&state, 1).await;
    if client.send(Message::text("clicked")).await.is_err() {
        panic!("client send failed");
    }

    for _ in 0..100 {
        if received.lock().map(|v| !v.is_empty()).unwrap_or(false) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let received = received.lock().map(|v| v.clone()).unwrap_or_default();
    assert_eq!(received, vec!["clicked".to_string()]);
}
