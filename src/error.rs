//! Service-level error taxonomy.
//!
//! Every public core method returns a `Result` carrying a [`ServiceError`].
//! The taxonomy is deliberately small and cloneable: batch execution stores
//! per-item failures, and the cache's single-flight table broadcasts a
//! producer's error to every waiting caller, so errors must be `Clone`.
//!
//! Error responses use a flat JSON envelope:
//!
//! ```json
//! {"success": false, "error_code": "validation_error", "error_message": "...", "trace_id": "..."}
//! ```
//!
//! Messages are concise and never include prompts, keys, or backtraces.

use axum::{Json, response::IntoResponse, response::Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Classified error kinds, surfaced as `error_code` strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    RateLimited,
    TransientAi,
    PermanentAi,
    InvalidResponse,
    Infrastructure,
    Configuration,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Returns the wire-format error code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Authentication => "authentication_error",
            Self::Authorization => "authorization_error",
            Self::RateLimited => "rate_limit_error",
            Self::TransientAi => "transient_ai_error",
            Self::PermanentAi => "permanent_ai_error",
            Self::InvalidResponse => "invalid_response_error",
            Self::Infrastructure => "infrastructure_error",
            Self::Configuration => "configuration_error",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified service error.
///
/// Transient variants are recovered inside the resilience orchestrator and
/// only surface when retries are exhausted and no fallback applies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// Malformed input or output shape. Surfaced as HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Request has no key or a bad key. Surfaced as HTTP 401.
    #[error("{0}")]
    Authentication(String),

    /// Key is valid but lacks scope. Surfaced as HTTP 403.
    #[error("{0}")]
    Authorization(String),

    /// Provider or local rate limit. Transient at the orchestrator.
    #[error("{message}")]
    RateLimited {
        message: String,
        /// Provider-supplied retry hint, honored up to the strategy's
        /// max backoff.
        retry_after_ms: Option<u64>,
    },

    /// Network / 5xx / timeout class. Recovered by retry + fallback.
    #[error("{0}")]
    TransientAi(String),

    /// Provider rejected the request. No retry. Surfaced as HTTP 502.
    #[error("{0}")]
    PermanentAi(String),

    /// Model output failed response validation. Retried like a transient
    /// failure, but never replaced by a fallback: persistent invalidity
    /// surfaces to the caller as a validation failure.
    #[error("{0}")]
    InvalidResponse(String),

    /// Remote cache or OS-level trouble. Logged and usually swallowed.
    #[error("{0}")]
    Infrastructure(String),

    /// Only raised at startup or on explicit key reload.
    #[error("{0}")]
    Configuration(String),

    /// Caller cancelled the request. Does not open circuit breakers and
    /// never produces a fallback.
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected failure inside the core. Logged with trace id.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::TransientAi(_) => ErrorKind::TransientAi,
            Self::PermanentAi(_) => ErrorKind::PermanentAi,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the resilience orchestrator should retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::TransientAi(_)
                | Self::InvalidResponse(_)
                | Self::Infrastructure(_)
        )
    }

    /// Whether an exhausted retry loop may substitute the typed fallback.
    ///
    /// Output-validation failures are retryable but must surface rather than
    /// degrade, so the caller sees why the operation produced nothing usable.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::TransientAi(_) | Self::Infrastructure(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::InvalidResponse => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::TransientAi | ErrorKind::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PermanentAi => StatusCode::BAD_GATEWAY,
            ErrorKind::Configuration | ErrorKind::Cancelled | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Wire-format error envelope.
///
/// `trace_id` is filled in by the trace-id middleware so handlers do not
/// need to thread it through every failure path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error_code: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            success: false,
            error_code: err.kind().as_str().to_string(),
            error_message: err.to_string(),
            trace_id: None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = %self.kind(), "request failed");
        }
        (status, Json(ErrorEnvelope::from_error(&self))).into_response()
    }
}

/// Count of panics caught at the HTTP boundary. Panics never crash the
/// process; they surface as generic 500s and are metered here.
pub static PANIC_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Panic handler for the HTTP boundary: log, meter, and answer with the
/// generic internal-error envelope (no payload details leak).
pub fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    PANIC_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("<non-string panic payload>");
    tracing::error!(detail, "panic caught at the HTTP boundary");

    ServiceError::Internal("an unexpected internal error occurred".to_string()).into_response()
}
