//! API-key authentication.
//!
//! Two presentation forms are accepted: `Authorization: Bearer <key>` and
//! `X-API-Key: <key>`. Validation is an O(1) exact-match set lookup.
//!
//! Key material is loaded at startup from `API_KEY` and
//! `ADDITIONAL_API_KEYS`; `reload_keys` refreshes the set at runtime under
//! a reader-writer lock, so the hot path stays read-only. Development with
//! zero keys enters open mode: every request is identified as
//! `"development"` and a warning is logged once at startup.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    config::{AuthConfig, Environment},
    error::ServiceError,
};

/// Identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

/// Shared key registry.
pub struct ApiKeyRegistry {
    keys: RwLock<HashSet<String>>,
    environment: Environment,
}

impl ApiKeyRegistry {
    pub fn new(config: &AuthConfig, environment: Environment) -> Self {
        let keys: HashSet<String> = config.api_keys.iter().cloned().collect();
        if keys.is_empty() && environment == Environment::Development {
            tracing::warn!(
                "No API keys configured; running in development open mode. \
                 Every request is identified as 'development'."
            );
        } else {
            tracing::info!(key_count = keys.len(), "API key authentication enabled");
        }
        Self {
            keys: RwLock::new(keys),
            environment,
        }
    }

    /// Exact-match, case-sensitive verification.
    pub fn verify(&self, key: &str) -> bool {
        self.keys.read().contains(key)
    }

    /// Open mode: development with zero configured keys.
    pub fn open_mode(&self) -> bool {
        self.environment == Environment::Development && self.keys.read().is_empty()
    }

    /// Re-read key material from the environment. The only mutation path;
    /// guarded so hot-path reads never block on it for long.
    pub fn reload_keys(&self) -> Result<usize, ServiceError> {
        let fresh = AuthConfig::from_env();
        fresh
            .validate(self.environment)
            .map_err(|e| ServiceError::Configuration(e.to_string()))?;
        let count = fresh.api_keys.len();
        *self.keys.write() = fresh.api_keys.into_iter().collect();
        tracing::info!(key_count = count, "API keys reloaded");
        Ok(count)
    }

    /// Status snapshot for the internal auth endpoint. Never includes key
    /// material.
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            api_keys_configured: self.keys.read().len(),
            open_mode: self.open_mode(),
            environment: self.environment,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub api_keys_configured: usize,
    pub open_mode: bool,
    pub environment: Environment,
}

/// Extract the presented key from either accepted header form.
fn presented_key(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request.headers().get(http::header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }
    request
        .headers()
        .get("X-API-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Middleware protecting the processing surface.
pub async fn require_api_key(
    State(registry): State<Arc<ApiKeyRegistry>>,
    mut request: Request,
    next: Next,
) -> Response {
    if registry.open_mode() {
        request
            .extensions_mut()
            .insert(CallerIdentity("development".to_string()));
        return next.run(request).await;
    }

    match presented_key(&request) {
        Some(key) if registry.verify(&key) => {
            // The key itself is the identity; it is never logged.
            request.extensions_mut().insert(CallerIdentity(key));
            next.run(request).await
        }
        Some(_) => ServiceError::Authentication("invalid API key".to_string()).into_response(),
        None => ServiceError::Authentication(
            "missing API key; use 'Authorization: Bearer <key>' or 'X-API-Key: <key>'"
                .to_string(),
        )
        .into_response(),
    }
}
