//! HTTP API integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use presence_relay::config::Settings;
use presence_relay::server::{create_app, AppState};

fn test_app() -> (AppState, Router) {
    let state = AppState::new(Settings::default());
    let app = create_app(state.clone());
    (state, app)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (_state, app) = test_app();

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn test_users_endpoints() {
    let (state, app) = test_app();
    let (tx, _rx) = mpsc::channel(16);
    let handle = state.connection_manager.register(tx);
    state
        .router
        .handle_text(&handle, r#"{"type":"login","username":"alice"}"#)
        .await;
    state
        .router
        .handle_text(&handle, r#"{"type":"position","lat":10.5,"lng":-3.25}"#)
        .await;

    let (status, body) = get_json(app.clone(), "/api/v1/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["username"], "alice");

    let (status, body) = get_json(app.clone(), "/api/v1/users/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["lat"], 10.5);
    assert_eq!(body["lng"], -3.25);
    assert_eq!(body["range"], 1000.0);

    let (status, body) = get_json(app, "/api/v1/users/bob").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_stats_counts_router_activity() {
    let (state, app) = test_app();
    let (tx, _rx) = mpsc::channel(16);
    let handle = state.connection_manager.register(tx);
    state.router.handle_text(&handle, "garbage").await;
    state
        .router
        .handle_text(&handle, r#"{"type":"login","username":"alice"}"#)
        .await;

    let (status, body) = get_json(app, "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"]["open_connections"], 1);
    assert_eq!(body["sessions"], 1);
    assert_eq!(body["router"]["logins"], 1);
    assert_eq!(body["router"]["dropped_malformed"], 1);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (state, app) = test_app();
    let (tx, _rx) = mpsc::channel(16);
    let handle = state.connection_manager.register(tx);
    state
        .router
        .handle_text(&handle, r#"{"type":"login","username":"alice"}"#)
        .await;

    let (status, body) = get(app, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("relay_sessions_active"));
    assert!(text.contains("relay_envelopes_received_total"));
}
