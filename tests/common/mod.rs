//! Shared helpers for the HTTP test suites.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use minicouch::common::BucketConfig;
use minicouch::rest::{create_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

/// A router over a fresh in-memory bucket with the views installed.
pub fn test_router() -> Router {
    let bucket = minicouch::bucket::connect(&BucketConfig::default()).unwrap();
    create_router(AppState { bucket })
}

/// Send a request and return the raw response.
pub async fn raw_request(
    router: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> Response<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    router
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Send a JSON request and return status plus decoded body.
pub async fn json_request(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (content_type, bytes) = match body {
        Some(v) => (Some("application/json"), serde_json::to_vec(&v).unwrap()),
        None => (None, Vec::new()),
    };
    let response = raw_request(router, method, uri, content_type, bytes).await;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
