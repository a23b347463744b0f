//! Shared helpers for driving the router in integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ghdash_api::{create_router, AppState, GhdashConfig};
use ghdash_test_utils::SwrHarness;
use serde_json::Value;
use tower::ServiceExt;

/// Router over the harness policy, reading time from the harness clock.
pub fn app(harness: &SwrHarness) -> Router {
    let state = AppState::new(harness.policy.clone()).with_clock(harness.clock.clone());
    create_router(state, &GhdashConfig::default())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|e| panic!("request failed: {:?}", e));
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|e| panic!("failed to read body: {:?}", e));
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, json)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("failed to build request: {}", e));
    send(router, request).await
}

pub async fn post(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("failed to build request: {}", e));
    send(router, request).await
}
