//! Trace-id middleware for request correlation.
//!
//! Generates or propagates an opaque trace id for each request, attaches
//! it to the request span, echoes it in a response header, and injects it
//! into JSON error envelopes so callers can quote it when reporting
//! problems.

use axum::{
    body::Body,
    extract::Request,
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use uuid::Uuid;

/// Header name for the trace id.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Extension containing the trace id for the current request.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware that attaches a trace id to each request.
///
/// An incoming `X-Trace-Id` header is propagated; otherwise a new UUID is
/// generated.
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| TraceId(value.to_string()))
        .unwrap_or_default();

    req.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let _guard = span.enter();

    let response = next.run(req).await;
    let mut response = inject_trace_id_into_error(response, &trace_id).await;

    if let Ok(value) = trace_id.0.parse() {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Fill the `trace_id` field of JSON error envelopes (4xx/5xx).
async fn inject_trace_id_into_error(response: Response, trace_id: &TraceId) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return (parts, Body::empty()).into_response(),
    };

    let modified = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut json) => {
            if let Some(object) = json.as_object_mut() {
                object.insert(
                    "trace_id".to_string(),
                    serde_json::Value::String(trace_id.0.clone()),
                );
            }
            serde_json::to_vec(&json).unwrap_or_else(|_| bytes.to_vec())
        }
        Err(_) => bytes.to_vec(),
    };

    Response::from_parts(parts, Body::from(modified))
}
