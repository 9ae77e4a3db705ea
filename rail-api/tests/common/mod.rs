#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rail_api::{app, AppState};
use rail_shared::Masked;
use rail_store::app_config::{AuthConfig, BookingRules};
use rail_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse";

pub fn auth_config(allow_admin_registration: bool) -> AuthConfig {
    AuthConfig {
        jwt_secret: Masked("integration-secret".to_string()),
        jwt_expiration_seconds: 3600,
        allow_admin_registration,
        min_password_length: 8,
    }
}

pub fn test_state_with(allow_admin_registration: bool, reservation_timeout_ms: u64) -> AppState {
    AppState::in_memory(
        MemoryStore::new(),
        auth_config(allow_admin_registration),
        BookingRules {
            reservation_timeout_ms,
        },
    )
}

pub fn test_state() -> AppState {
    test_state_with(true, 5_000)
}

/// Sends one request through the full router and returns the status and the JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn register(app: &Router, username: &str, role: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": username, "password": PASSWORD, "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
    body["token"].as_str().unwrap().to_string()
}

/// Creates Pune and Nagpur, train 11039 between them, and one trip with `total_seats`.
/// Returns the trip id.
pub async fn seed_route(app: &Router, admin: &str, total_seats: i32) -> i64 {
    for name in ["Pune", "Nagpur"] {
        let (status, _) = post(app, "/stations", admin, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = post(
        app,
        "/trains",
        admin,
        json!({ "no": "11039", "name": "Maharashtra Express", "source": "Pune", "destination": "Nagpur" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    create_trip(app, admin, "2030-03-01T06:00:00Z", "2030-03-02T00:30:00Z", total_seats).await
}

pub async fn create_trip(app: &Router, admin: &str, start: &str, end: &str, total_seats: i32) -> i64 {
    let (status, body) = post(
        app,
        "/trips",
        admin,
        json!({
            "train": "11039",
            "starting_time_date": start,
            "ending_time_date": end,
            "total_seats": total_seats,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}
