//! tessera — a hardened text-processing API fronting a third-party LLM.
//!
//! The core turns single-shot model calls into a multi-tenant service:
//! a two-tier encrypted cache, per-operation circuit breakers and retry
//! policies with typed fallbacks, bounded-concurrency batch execution, and
//! preset-driven configuration with fail-fast validation.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod processor;
pub mod provider;
pub mod resilience;
pub mod routes;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::{
    auth::ApiKeyRegistry,
    cache::CacheFacade,
    config::{ConfigValidator, CoreConfig},
    processor::{BatchExecutor, RegistryError, TextProcessor},
    provider::LlmClient,
    resilience::ResilienceOrchestrator,
};

/// Maximum accepted request body (batches of large documents).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state, created once by the composition root and
/// cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub processor: Arc<TextProcessor>,
    pub batch: Arc<BatchExecutor>,
    pub cache: Arc<CacheFacade>,
    pub resilience: Arc<ResilienceOrchestrator>,
    pub auth: Arc<ApiKeyRegistry>,
    pub validator: Arc<ConfigValidator>,
}

impl AppState {
    /// Wire the core together. The remote cache tier and the LLM client
    /// are injected so the composition root (and tests) decide what is
    /// real.
    pub fn new(
        config: Arc<CoreConfig>,
        remote: Option<Arc<dyn cache::RemoteTier>>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, AppStateError> {
        let cache = Arc::new(CacheFacade::new(&config.cache, remote)?);
        let resilience = Arc::new(ResilienceOrchestrator::new(config.resilience.clone()));
        let processor = Arc::new(TextProcessor::new(
            config.clone(),
            cache.clone(),
            resilience.clone(),
            llm,
        )?);
        let batch = Arc::new(BatchExecutor::new(
            processor.clone(),
            config.ai.batch_concurrency_limit,
            config.ai.max_batch_items,
        ));
        let auth = Arc::new(ApiKeyRegistry::new(&config.auth, config.environment));

        Ok(Self {
            config,
            processor,
            batch,
            cache,
            resilience,
            auth,
            validator: Arc::new(ConfigValidator::default()),
        })
    }
}

/// Errors raised while wiring the application state.
#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error(transparent)]
    Cache(#[from] cache::CacheError),

    /// Internal invariant violation (exit code 70).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build the HTTP router.
pub fn build_app(state: AppState) -> Router {
    let authed = Router::new()
        .route("/v1/process", post(routes::process::process))
        .route("/v1/batch", post(routes::process::process_batch))
        .route("/v1/operations", get(routes::process::operations))
        .route(
            "/v1/internal/config/validate",
            post(routes::health::validate_config),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/internal/auth/status", get(routes::health::auth_status))
        .merge(authed)
        // Innermost first: panics become enveloped 500s, then the trace id
        // is stamped onto whatever comes back.
        .layer(CatchPanicLayer::custom(
            error::handle_panic as fn(Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response,
        ))
        .layer(axum::middleware::from_fn(middleware::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
