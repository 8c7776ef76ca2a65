use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alerta_gateway::connection::handle_connection;
use alerta_gateway::{ConnectionSettings, Dispatcher, TokenVerifier};
use alerta_types::models::{Principal, Role};
use axum::{Router, extract::WebSocketUpgrade, routing::get};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};
use uuid::Uuid;

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const VALID_TOKEN: &str = "valid-token";

struct FixedVerifier(Principal);

impl TokenVerifier for FixedVerifier {
    fn verify_token(&self, token: &str) -> Option<Principal> {
        (token == VALID_TOKEN).then_some(self.0)
    }
}

fn fast_settings() -> ConnectionSettings {
    ConnectionSettings {
        heartbeat_interval: Duration::from_millis(50),
        max_missed_pongs: 2,
        identify_timeout: Duration::from_millis(200),
    }
}

async fn serve(dispatcher: Dispatcher, settings: ConnectionSettings) -> SocketAddr {
    let verifier: Arc<dyn TokenVerifier> = Arc::new(FixedVerifier(Principal {
        subject_id: Uuid::new_v4(),
        role: Role::Citizen,
    }));
    let app = Router::new().route(
        "/gateway",
        get(move |ws: WebSocketUpgrade| {
            let dispatcher = dispatcher.clone();
            let verifier = verifier.clone();
            async move {
                ws.on_upgrade(move |socket| handle_connection(socket, dispatcher, verifier, settings))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/gateway"))
        .await
        .expect("failed to connect");
    ws
}

/// Identify and wait for Ready.
async fn identified(addr: SocketAddr) -> Ws {
    let mut ws = connect(addr).await;
    let identify = json!({ "type": "Identify", "data": { "token": VALID_TOKEN } });
    ws.send(Message::Text(identify.to_string().into())).await.unwrap();

    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for Ready")
            .expect("gateway closed")
            .expect("gateway error");
        if let Message::Text(text) = msg {
            let ready: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(ready["type"], "Ready");
            return ws;
        }
    }
}

async fn wait_for_subscribers(dispatcher: &Dispatcher, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while dispatcher.subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} subscribers, still {}",
            dispatcher.subscriber_count()
        )
    });
}

/// Drain the socket until the server hangs up.
async fn assert_closed(ws: &mut Ws) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("gateway kept the connection open");
}

#[tokio::test]
async fn test_unanswered_pings_drop_connection() {
    let dispatcher = Dispatcher::new();
    let addr = serve(dispatcher.clone(), fast_settings()).await;

    // Never polled again after Ready, so no Pong goes back
    let mut ws = identified(addr).await;
    assert_eq!(dispatcher.subscriber_count(), 1);

    wait_for_subscribers(&dispatcher, 0).await;
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_answered_pings_keep_connection() {
    let dispatcher = Dispatcher::new();
    let addr = serve(dispatcher.clone(), fast_settings()).await;

    let mut ws = identified(addr).await;
    // Reading lets the client answer every Ping
    let reader = tokio::spawn(async move { while let Some(Ok(_)) = ws.next().await {} });

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(dispatcher.subscriber_count(), 1);
    reader.abort();
}

#[tokio::test]
async fn test_silent_client_is_dropped_before_subscribing() {
    let dispatcher = Dispatcher::new();
    let addr = serve(dispatcher.clone(), fast_settings()).await;

    let mut ws = connect(addr).await;
    assert_closed(&mut ws).await;
    assert_eq!(dispatcher.subscriber_count(), 0);
}
