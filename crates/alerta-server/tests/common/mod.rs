#![allow(dead_code)]

use alerta_api::AppState;
use alerta_server::config::{Config, SeedAccount};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@alerta.pe";
pub const ADMIN_PASSWORD: &str = "admin-pass-1";

const BOUNDARY: &str = "alerta-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Keeps the upload directory alive for the test's duration
    pub uploads: TempDir,
}

pub fn test_config(upload_dir: &TempDir) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: TEST_SECRET.into(),
        upload_dir: upload_dir.path().join("uploads"),
        allowed_origin: None,
        admin: Some(SeedAccount {
            email: ADMIN_EMAIL.into(),
            phone: "+51900000000".into(),
            national_id: "00000001".into(),
            display_name: "Admin".into(),
            password: ADMIN_PASSWORD.into(),
        }),
        seed_demo: false,
    }
}

pub async fn setup_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = test_config(&uploads);
    let state = alerta_server::build_state(&config).await.unwrap();
    let router = alerta_server::app(state.clone(), None).unwrap();
    TestApp {
        router,
        state,
        uploads,
    }
}

/// Send one request through the router and decode the JSON body (or
/// `Value::Null` for an empty body).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Hand-built `multipart/form-data` request for `POST /reports`.
pub fn report_request(token: &str, fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/reports")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

pub fn registration(first: &str, email: &str, phone: &str, national_id: &str) -> Value {
    json!({
        "first_name": first,
        "last_name": "Quispe",
        "national_id": national_id,
        "phone": phone,
        "email": email,
        "password": "citizen-pass",
    })
}

/// Register a citizen and return `(token, user_id)`.
pub async fn register_citizen(router: &Router, first: &str, email: &str, phone: &str, national_id: &str) -> (String, String) {
    let (status, body) = send(
        router,
        json_request("POST", "/auth/register", None, &registration(first, email, phone, national_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

pub async fn admin_token(router: &Router) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "credential": ADMIN_EMAIL, "kind": "email", "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    assert_eq!(body["user"]["role"], "admin");
    body["token"].as_str().unwrap().to_string()
}

/// File a report with a category and location; returns the report JSON.
pub async fn file_report(router: &Router, token: &str, category: &str) -> Value {
    let (status, body) = send(
        router,
        report_request(
            token,
            &[
                ("category", category),
                ("description", "Streetlight out on Av. Grau"),
                ("lat", "-12.05"),
                ("lng", "-77.04"),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create report failed: {body}");
    body
}
