mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(app: &TestApp) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Next JSON text frame, skipping control frames.
async fn next_event(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for gateway event")
            .expect("gateway closed")
            .expect("gateway error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("gateway sent invalid JSON");
        }
    }
}

async fn identify(addr: std::net::SocketAddr, token: &str) -> Ws {
    let (mut ws, _) = connect_async(format!("ws://{addr}/gateway"))
        .await
        .expect("failed to connect");
    let identify = json!({ "type": "Identify", "data": { "token": token } });
    ws.send(Message::Text(identify.to_string().into()))
        .await
        .expect("failed to send identify");
    ws
}

#[tokio::test]
async fn test_gateway_streams_lifecycle_in_order() {
    let app = setup_app().await;
    let addr = serve(&app).await;
    let admin = admin_token(&app.router).await;
    let (rosa, rosa_id) =
        register_citizen(&app.router, "Rosa", "rosa@mail.pe", "+51987654321", "44556677").await;

    let mut ws = identify(addr, &admin).await;
    let ready = next_event(&mut ws).await;
    assert_eq!(ready["type"], "Ready");
    assert_eq!(ready["data"]["role"], "admin");

    let report = file_report(&app.router, &rosa, "robbery").await;
    let id = report["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        json_request("PUT", &format!("/reports/{id}/status"), Some(&admin), &json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, empty_request("DELETE", &format!("/reports/{id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);

    let created = next_event(&mut ws).await;
    assert_eq!(created["type"], "ReportCreated");
    assert_eq!(created["data"]["id"], id);
    assert_eq!(created["data"]["owner_id"], rosa_id);

    let changed = next_event(&mut ws).await;
    assert_eq!(changed, json!({ "type": "StatusChanged", "data": { "id": id, "status": "in_progress" } }));

    let deleted = next_event(&mut ws).await;
    assert_eq!(deleted, json!({ "type": "ReportDeleted", "data": { "id": id } }));
}

#[tokio::test]
async fn test_gateway_rejects_failed_calls_silently() {
    let app = setup_app().await;
    let addr = serve(&app).await;
    let admin = admin_token(&app.router).await;
    let (rosa, _) =
        register_citizen(&app.router, "Rosa", "rosa@mail.pe", "+51987654321", "44556677").await;

    let mut ws = identify(addr, &rosa).await;
    assert_eq!(next_event(&mut ws).await["type"], "Ready");

    let report = file_report(&app.router, &rosa, "robbery").await;
    let id = report["id"].as_str().unwrap().to_string();
    assert_eq!(next_event(&mut ws).await["type"], "ReportCreated");

    // Forbidden, unknown literal and a no-op change publish nothing
    let uri = format!("/reports/{id}/status");
    send(&app.router, json_request("PUT", &uri, Some(&rosa), &json!({ "status": "resolved" }))).await;
    send(&app.router, json_request("PUT", &uri, Some(&admin), &json!({ "status": "closed" }))).await;
    send(&app.router, json_request("PUT", &uri, Some(&admin), &json!({ "status": "pending" }))).await;

    let (status, _) = send(&app.router, json_request("PUT", &uri, Some(&admin), &json!({ "status": "resolved" }))).await;
    assert_eq!(status, StatusCode::OK);

    let next = next_event(&mut ws).await;
    assert_eq!(next["type"], "StatusChanged");
    assert_eq!(next["data"]["status"], "resolved");
}

#[tokio::test]
async fn test_gateway_requires_valid_token() {
    let app = setup_app().await;
    let addr = serve(&app).await;

    let mut ws = identify(addr, "garbage").await;
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                Some(Ok(Message::Text(_))) => return false,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("gateway did not close unauthenticated connection");
    assert!(closed, "gateway sent an event to an unauthenticated client");
    assert_eq!(app.state.dispatcher.subscriber_count(), 0);
}
