//! Provider error classification.
//!
//! Translates transport- and HTTP-level failures from the LLM provider
//! into the service taxonomy: 5xx/timeouts/connect errors are transient,
//! 429 is rate-limited (honoring `Retry-After`), auth failures and other
//! 4xx are permanent.

use http::StatusCode;
use thiserror::Error;

use crate::error::ServiceError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        /// Parsed `Retry-After` hint in milliseconds (429 only).
        retry_after_ms: Option<u64>,
    },

    #[error("provider response contained no candidates")]
    EmptyResponse,

    #[error("provider response could not be parsed: {0}")]
    Parse(String),

    #[error("no provider API key configured")]
    MissingApiKey,
}

impl From<ProviderError> for ServiceError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Http(e) => {
                if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
                    ServiceError::TransientAi(format!("provider unreachable: {e}"))
                } else {
                    ServiceError::TransientAi(format!("provider request failed: {e}"))
                }
            }
            ProviderError::Status {
                status,
                message,
                retry_after_ms,
            } => classify_status(status, message, retry_after_ms),
            ProviderError::EmptyResponse => {
                ServiceError::InvalidResponse("provider returned no candidates".to_string())
            }
            ProviderError::Parse(reason) => {
                ServiceError::InvalidResponse(format!("unparseable provider response: {reason}"))
            }
            ProviderError::MissingApiKey => {
                ServiceError::Configuration("no provider API key configured".to_string())
            }
        }
    }
}

fn classify_status(
    status: StatusCode,
    message: String,
    retry_after_ms: Option<u64>,
) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::RateLimited {
            message,
            retry_after_ms,
        };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        // A bad provider key is an operator problem, not a caller problem.
        return ServiceError::PermanentAi(format!("provider authentication failed: {message}"));
    }
    if status.is_server_error() {
        return ServiceError::TransientAi(format!("provider {status}: {message}"));
    }
    if status.is_client_error() {
        return ServiceError::PermanentAi(format!("provider rejected request ({status}): {message}"));
    }
    ServiceError::TransientAi(format!("unexpected provider status {status}: {message}"))
}
