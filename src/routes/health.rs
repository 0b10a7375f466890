//! Health and internal operator endpoints.

use axum::{Extension, Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth::{AuthStatus, CallerIdentity},
    cache::CacheStats,
    config::{CacheConfig, ValidationOutcome, get_preset_details},
    resilience::OperationMetricsSnapshot,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded" (a dead remote tier degrades, it never
    /// makes the service unhealthy).
    pub status: String,
    pub version: String,
    /// Panics caught at the HTTP boundary since startup.
    pub panics: u64,
    pub cache: CacheHealth,
    pub resilience: ResilienceHealth,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub l1_size: u64,
    /// `null` when no remote tier is configured.
    pub remote_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

#[derive(Debug, Serialize)]
pub struct ResilienceHealth {
    pub open_breakers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<(String, OperationMetricsSnapshot)>>,
}

/// `GET /v1/health`
#[tracing::instrument(name = "health.check", skip_all)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats();
    let remote_ok = state.cache.remote_ok().await;
    let open_breakers = state.resilience.open_breakers();

    let degraded = remote_ok == Some(false) || !open_breakers.is_empty();
    let monitoring = state.config.logging.monitoring_enabled;

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        panics: crate::error::PANIC_COUNTER.load(std::sync::atomic::Ordering::Relaxed),
        cache: CacheHealth {
            l1_size: stats.l1_size,
            remote_ok,
            stats: monitoring.then_some(stats),
        },
        resilience: ResilienceHealth {
            open_breakers,
            operations: monitoring.then(|| state.resilience.metrics()),
        },
    };

    (StatusCode::OK, Json(response))
}

/// `GET /v1/internal/auth/status` — counts and environment mode, never
/// key material.
pub async fn auth_status(State(state): State<AppState>) -> Json<AuthStatus> {
    Json(state.auth.status())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateConfigRequest {
    /// Validate a named preset...
    #[serde(default)]
    pub preset: Option<String>,
    /// ...or a full candidate cache configuration.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ValidateConfigResponse {
    Outcome(ValidationOutcome),
    Preset(serde_json::Value),
}

/// `POST /v1/internal/config/validate` — rate-limited per caller.
#[tracing::instrument(name = "config.validate", skip_all)]
pub async fn validate_config(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(request): Json<ValidateConfigRequest>,
) -> Json<ValidateConfigResponse> {
    if let Some(candidate) = request.cache {
        return Json(ValidateConfigResponse::Outcome(
            state.validator.validate_cache_config(&identity.0, &candidate),
        ));
    }

    if let Some(preset) = request.preset {
        let outcome = match get_preset_details(&preset) {
            Some(details) => ValidateConfigResponse::Preset(
                serde_json::to_value(details).unwrap_or_default(),
            ),
            None => ValidateConfigResponse::Outcome(ValidationOutcome {
                is_valid: false,
                errors: vec![format!("unknown preset '{preset}'")],
                suggestion: Some(
                    "known presets: disabled, minimal, simple, development, production, \
                     ai-development, ai-production"
                        .to_string(),
                ),
            }),
        };
        return Json(outcome);
    }

    Json(ValidateConfigResponse::Outcome(ValidationOutcome {
        is_valid: false,
        errors: vec!["provide either 'preset' or 'cache'".to_string()],
        suggestion: None,
    }))
}
