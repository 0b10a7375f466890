//! End-to-end tests over the HTTP surface with a scripted provider.

use std::sync::Arc;

use axum::{Router, body::Body};
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{
    AppState, build_app,
    provider::test::{ScriptedClient, ScriptedFailure},
};

fn test_state(keys: &[&str], client: Arc<ScriptedClient>) -> AppState {
    let mut config = crate::processor::tests::test_config();
    config.auth.api_keys = keys.iter().map(|k| k.to_string()).collect();
    AppState::new(Arc::new(config), None, client).expect("state builds")
}

fn app(keys: &[&str], client: Arc<ScriptedClient>) -> Router {
    build_app(test_state(keys, client))
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn summarize_body(text: &str) -> Value {
    json!({ "text": text, "operation": "summarize" })
}

#[tokio::test]
async fn test_process_end_to_end() {
    let client = Arc::new(ScriptedClient::always("A fine summary."));
    let app = app(&["sk-test"], client);

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        Some("sk-test"),
        Some(summarize_body("A long document about nothing much.")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["operation"], "summarize");
    assert_eq!(body["result"]["type"], "text");
    assert_eq!(body["result"]["value"], "A fine summary.");
    assert_eq!(body["metadata"]["cached"], false);
    assert!(body["trace_id"].is_string());
}

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let client = Arc::new(ScriptedClient::always("cached summary"));
    let app = app(&["sk-test"], client.clone());

    let body = summarize_body("same document");
    let (_, first) = send_json(&app, "POST", "/v1/process", Some("sk-test"), Some(body.clone())).await;
    let (_, second) = send_json(&app, "POST", "/v1/process", Some("sk-test"), Some(body)).await;

    assert_eq!(first["metadata"]["cached"], false);
    assert_eq!(second["metadata"]["cached"], true);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_missing_key_is_401_with_trace_id() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        None,
        Some(summarize_body("doc")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "authentication_error");
    assert!(body["trace_id"].is_string(), "middleware injects trace_id");
}

#[tokio::test]
async fn test_bad_key_is_401() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));
    let (status, _) = send_json(
        &app,
        "POST",
        "/v1/process",
        Some("sk-wrong"),
        Some(summarize_body("doc")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_open_mode_without_keys() {
    // Development with zero keys: requests pass without credentials.
    let app = app(&[], Arc::new(ScriptedClient::always("open")));
    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        None,
        Some(summarize_body("doc")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["value"], "open");
}

#[tokio::test]
async fn test_unknown_option_rejected_at_boundary() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));
    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        Some("sk-test"),
        Some(json!({
            "text": "doc",
            "operation": "summarize",
            "options": { "max_size": 10 }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "validation_error");
}

#[tokio::test]
async fn test_validation_error_shape() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));
    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        Some("sk-test"),
        Some(summarize_body("   ")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "validation_error");
    assert!(body["error_message"].is_string());
}

#[tokio::test]
async fn test_batch_mixed_outcomes() {
    let client = Arc::new(ScriptedClient::always("s"));
    let app = app(&["sk-test"], client);

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/batch",
        Some("sk-test"),
        Some(json!({
            "batch_id": "batch-7",
            "items": [
                { "text": "first valid doc", "operation": "summarize" },
                { "text": "  ", "operation": "summarize" },
                { "text": "second valid doc", "operation": "summarize" }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch_id"], "batch-7");
    assert_eq!(body["total"], 3);
    assert_eq!(body["completed"], 2);
    assert_eq!(body["failed"], 1);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["status"], "ok");
    assert_eq!(items[1]["status"], "err");
    assert_eq!(items[1]["error_code"], "validation_error");
    assert_eq!(items[2]["status"], "ok");
}

#[tokio::test]
async fn test_operations_catalog() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));
    let (status, body) = send_json(&app, "GET", "/v1/operations", Some("sk-test"), None).await;

    assert_eq!(status, StatusCode::OK);
    let operations = body["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 5);
    let qa = operations
        .iter()
        .find(|op| op["operation"] == "qa")
        .unwrap();
    assert_eq!(qa["requires_question"], true);
    assert_eq!(qa["response_field"], "answer");
}

#[tokio::test]
async fn test_health_is_open_and_shaped() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));
    let (status, body) = send_json(&app, "GET", "/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["cache"]["l1_size"].is_number());
    assert!(body["cache"]["remote_ok"].is_null(), "no remote configured");
    assert_eq!(body["resilience"]["open_breakers"], json!([]));
}

#[tokio::test]
async fn test_auth_status_exposes_counts_only() {
    let app = app(&["sk-secret"], Arc::new(ScriptedClient::always("x")));
    let (status, body) = send_json(&app, "GET", "/v1/internal/auth/status", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_keys_configured"], 1);
    assert_eq!(body["open_mode"], false);
    assert_eq!(body["environment"], "development");
    assert!(!body.to_string().contains("sk-secret"));
}

#[tokio::test]
async fn test_degraded_fallback_through_http() {
    let client = Arc::new(ScriptedClient::always("unused"));
    // Balanced strategy performs three attempts.
    for _ in 0..3 {
        client.push_failure(ScriptedFailure::Transient("provider down".into()));
    }
    let app = app(&["sk-test"], client);

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/process",
        Some("sk-test"),
        Some(summarize_body("doc needing summary")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["metadata"]["degraded"], true);
    assert_eq!(
        body["result"]["value"],
        "Service temporarily unavailable; please retry shortly."
    );
}

#[tokio::test]
async fn test_config_validate_endpoint() {
    let app = app(&["sk-test"], Arc::new(ScriptedClient::always("x")));

    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/internal/config/validate",
        Some("sk-test"),
        Some(json!({ "preset": "production" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "production");
    assert_eq!(body["default_ttl"], 7200);

    let (_, body) = send_json(
        &app,
        "POST",
        "/v1/internal/config/validate",
        Some("sk-test"),
        Some(json!({ "cache": { "default_ttl": 10 } })),
    )
    .await;
    assert_eq!(body["is_valid"], false);
    assert!(body["errors"][0].as_str().unwrap().contains("default_ttl"));
}
