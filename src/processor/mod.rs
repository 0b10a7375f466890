//! Text-processing orchestration.
//!
//! [`TextProcessor`] drives the canonical request path for one request:
//! validate → sanitize → cache key → cache lookup → resilient model call →
//! response validation → typed parse → cache store. [`BatchExecutor`] fans
//! a list of requests out over that path under a concurrency bound.

mod batch;
mod operations;
mod parse;
mod prompts;
mod sanitize;
mod types;
mod validate;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub use batch::BatchExecutor;
pub use operations::{
    FallbackKind, Operation, OperationDescriptor, OperationRegistry, OperationSpec, RegistryError,
};
pub use sanitize::sanitize;
use tokio_util::sync::CancellationToken;
pub use types::*;
use uuid::Uuid;

use crate::{
    cache::{CacheFacade, ComputedValue},
    config::CoreConfig,
    error::ServiceError,
    provider::LlmClient,
    resilience::{Executed, ResilienceOrchestrator},
};

/// Orchestrator façade for single requests.
pub struct TextProcessor {
    config: Arc<CoreConfig>,
    registry: OperationRegistry,
    cache: Arc<CacheFacade>,
    resilience: Arc<ResilienceOrchestrator>,
    llm: Arc<dyn LlmClient>,
}

impl TextProcessor {
    /// Build the processor and register every operation with the
    /// resilience layer.
    pub fn new(
        config: Arc<CoreConfig>,
        cache: Arc<CacheFacade>,
        resilience: Arc<ResilienceOrchestrator>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, RegistryError> {
        let registry = OperationRegistry::new(&config.resilience, &config.cache)?;
        for operation in Operation::ALL {
            resilience.register_operation(operation.tag(), registry.strategy(operation));
        }
        Ok(Self {
            config,
            registry,
            cache,
            resilience,
            llm,
        })
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    pub fn resilience(&self) -> &ResilienceOrchestrator {
        &self.resilience
    }

    /// Process one request end-to-end.
    pub async fn process(
        &self,
        request: ProcessingRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessingResponse, ServiceError> {
        let started = Instant::now();
        let trace_id = request
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let spec = *self.registry.spec(request.operation);

        // Schema validation before any work.
        if request.text.trim().is_empty() {
            return Err(ServiceError::Validation("text must not be empty".into()));
        }
        if spec.requires_question {
            if request
                .question
                .as_deref()
                .is_none_or(|q| q.trim().is_empty())
            {
                return Err(ServiceError::Validation(format!(
                    "question is required for the {} operation",
                    spec.operation
                )));
            }
        } else if request.question.is_some() {
            return Err(ServiceError::Validation(format!(
                "question is only accepted by the qa operation, not {}",
                spec.operation
            )));
        }

        // Sanitized strings replace the originals for every later step.
        let text = sanitize(&request.text, "text", self.config.ai.max_input_chars)?;
        let question = match &request.question {
            Some(question) => Some(sanitize(
                question,
                "question",
                self.config.ai.max_question_chars,
            )?),
            None => None,
        };
        let mut options = request.options.clone();
        if let Some(detail) = &options.detail_level {
            options.detail_level = Some(sanitize(detail, "options.detail_level", 100)?);
        }

        let options_map = options.to_canonical_map();
        let key = self
            .cache
            .build_key(spec.operation.tag(), &text, &options_map, question.as_deref());

        // The single-flight producer only runs on a miss; when it does not
        // run, the response was served from cache or a sibling flight.
        let ran_producer = Arc::new(AtomicBool::new(false));
        let value = {
            let ran_producer = ran_producer.clone();
            let text = text.clone();
            let question = question.clone();
            let options = options.clone();
            self.cache
                .get_or_compute(&key, self.registry.ttl(spec.operation), move || async move {
                    ran_producer.store(true, Ordering::SeqCst);
                    let executed = self
                        .execute_model_call(spec, &text, &options, question.as_deref(), cancel)
                        .await?;
                    let (result, tokens) = executed.value;
                    let outcome = CachedOutcome {
                        result,
                        model: self.config.ai.model.clone(),
                        tokens,
                        degraded: executed.degraded,
                        cached_at: chrono::Utc::now().timestamp(),
                    };
                    let value = serde_json::to_value(&outcome).map_err(|e| {
                        ServiceError::Internal(format!("outcome serialization failed: {e}"))
                    })?;
                    Ok(if executed.degraded {
                        ComputedValue::transient(value)
                    } else {
                        ComputedValue::store(value)
                    })
                })
                .await?
        };

        let outcome: CachedOutcome = serde_json::from_value(value).map_err(|e| {
            ServiceError::Internal(format!("cached outcome has unexpected shape: {e}"))
        })?;
        let cached = !ran_producer.load(Ordering::SeqCst);

        tracing::debug!(
            operation = %spec.operation,
            trace_id = %trace_id,
            cached,
            degraded = outcome.degraded,
            duration_ms = started.elapsed().as_millis() as u64,
            "request processed"
        );

        Ok(ProcessingResponse {
            success: true,
            operation: spec.operation,
            result: outcome.result,
            metadata: ResponseMetadata {
                cached,
                degraded: outcome.degraded,
                duration_ms: started.elapsed().as_millis() as u64,
                model: outcome.model,
                tokens: outcome.tokens,
            },
            trace_id,
        })
    }

    async fn execute_model_call(
        &self,
        spec: OperationSpec,
        text: &str,
        options: &ProcessingOptions,
        question: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Executed<(ResultValue, Option<u64>)>, ServiceError> {
        let prompt = prompts::build_prompt(spec.operation, text, options, question);
        let model = self.config.ai.model.clone();
        let temperature = self.config.ai.temperature;
        let llm = self.llm.clone();
        let fallback_kind = spec.fallback;

        self.resilience
            .execute(
                spec.operation.tag(),
                cancel,
                move || {
                    let llm = llm.clone();
                    let prompt = prompt.clone();
                    let model = model.clone();
                    async move {
                        let generation = llm
                            .generate(&model, temperature, &prompt)
                            .await
                            .map_err(ServiceError::from)?;
                        validate::validate_response(&generation.text)?;
                        let result = parse::parse_result(&generation.text, fallback_kind)?;
                        Ok((result, generation.tokens))
                    }
                },
                Some(Box::new(move || (fallback_kind.fallback_value(), None))),
            )
            .await
    }
}
