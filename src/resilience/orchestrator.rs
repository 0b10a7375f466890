//! Per-operation resilience orchestration.
//!
//! Wraps every outbound model call in a circuit breaker + retry policy with
//! per-attempt timeouts, full-jitter exponential backoff, and a typed
//! fallback for when the provider is unavailable.
//!
//! Breaker state is mutated under lock-free atomics; the work future runs
//! outside any lock, and concurrent `execute` calls on the same operation
//! are allowed (the breaker is not a semaphore, except for the half-open
//! single probe).

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    circuit_breaker::{BreakerConfig, CircuitBreaker},
    metrics::{OperationMetrics, OperationMetricsSnapshot},
};
use crate::{
    config::{ResilienceConfig, Strategy, StrategyConfig},
    error::ServiceError,
};

/// Successful outcome of [`ResilienceOrchestrator::execute`].
#[derive(Debug)]
pub struct Executed<T> {
    pub value: T,
    /// True when the value came from the fallback producer rather than the
    /// primary work path.
    pub degraded: bool,
    /// Work invocations performed (0 when the breaker short-circuited).
    pub attempts: u32,
}

struct OperationEntry {
    strategy: Strategy,
    config: StrategyConfig,
    breaker: CircuitBreaker,
    metrics: OperationMetrics,
}

/// Registry of `(operation, strategy)` resilience state. Entries live for
/// the process lifetime and are never persisted.
pub struct ResilienceOrchestrator {
    entries: DashMap<String, Arc<OperationEntry>>,
    config: ResilienceConfig,
}

impl ResilienceOrchestrator {
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Bind an operation to a strategy. Idempotent; required before
    /// `execute`. Re-registering with a different strategy replaces the
    /// binding and resets breaker state.
    pub fn register_operation(&self, operation_id: &str, strategy: Strategy) {
        use dashmap::mapref::entry::Entry;
        match self.entries.entry(operation_id.to_string()) {
            Entry::Occupied(existing) if existing.get().strategy == strategy => {}
            entry => {
                let config = self.config.strategy(strategy).clone();
                let breaker = CircuitBreaker::new(
                    format!("{operation_id}:{strategy}"),
                    BreakerConfig {
                        failure_threshold: config.failure_threshold,
                        cooldown: config.cooldown(),
                        required_successes: config.halfopen_required_successes,
                    },
                );
                let new_entry = Arc::new(OperationEntry {
                    strategy,
                    config,
                    breaker,
                    metrics: OperationMetrics::default(),
                });
                match entry {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(new_entry);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(new_entry);
                    }
                }
            }
        }
    }

    pub fn is_registered(&self, operation_id: &str) -> bool {
        self.entries.contains_key(operation_id)
    }

    /// Run `work` under the operation's strategy.
    ///
    /// - While the breaker is open, `work` is skipped entirely; the
    ///   fallback (when given) is returned with `degraded = true`.
    /// - Retryable failures are retried up to `max_attempts` with full
    ///   jitter; a provider `retry_after` hint is honored up to the
    ///   strategy's max backoff.
    /// - Exhausted retries yield the fallback only for fallback-eligible
    ///   errors; everything else surfaces.
    /// - Cancellation surfaces immediately, is never counted against the
    ///   breaker, and never produces a fallback.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_id: &str,
        cancel: &CancellationToken,
        work: F,
        fallback: Option<Box<dyn FnOnce() -> T + Send>>,
    ) -> Result<Executed<T>, ServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let entry = self
            .entries
            .get(operation_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| {
                ServiceError::Internal(format!("operation '{operation_id}' is not registered"))
            })?;

        let started = Instant::now();
        let result = self
            .execute_inner(operation_id, &entry, cancel, work, fallback)
            .await;
        entry
            .metrics
            .record_duration_ms(started.elapsed().as_millis() as u64);
        result
    }

    async fn execute_inner<T, F, Fut>(
        &self,
        operation_id: &str,
        entry: &OperationEntry,
        cancel: &CancellationToken,
        work: F,
        fallback: Option<Box<dyn FnOnce() -> T + Send>>,
    ) -> Result<Executed<T>, ServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        // Closed or half-open-with-permit lets us through; otherwise skip
        // straight to the fallback.
        if let Err(rejection) = entry.breaker.try_acquire() {
            debug!(
                operation = operation_id,
                retry_after_secs = rejection.retry_after_secs,
                "circuit open, skipping work"
            );
            return match fallback {
                Some(produce) => {
                    entry
                        .metrics
                        .fallback_invocations
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    Ok(Executed {
                        value: produce(),
                        degraded: true,
                        attempts: 0,
                    })
                }
                None => Err(ServiceError::TransientAi(rejection.to_string())),
            };
        }

        let config = &entry.config;

        for attempt in 1..=config.max_attempts {
            if cancel.is_cancelled() {
                entry.breaker.release_probe();
                return Err(ServiceError::Cancelled);
            }

            entry
                .metrics
                .attempts
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    entry.breaker.release_probe();
                    return Err(ServiceError::Cancelled);
                }
                attempt_result = tokio::time::timeout(config.attempt_timeout(), work()) => {
                    match attempt_result {
                        Ok(result) => result,
                        Err(_) => {
                            entry.metrics.failures_timeout
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            Err(ServiceError::TransientAi(format!(
                                "attempt timed out after {}ms",
                                config.timeout_ms
                            )))
                        }
                    }
                }
            };

            match outcome {
                Ok(value) => {
                    entry.breaker.record_success();
                    entry
                        .metrics
                        .successes
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    if attempt > 1 {
                        debug!(
                            operation = operation_id,
                            attempt, "work succeeded after retry"
                        );
                    }
                    return Ok(Executed {
                        value,
                        degraded: false,
                        attempts: attempt,
                    });
                }
                Err(ServiceError::Cancelled) => {
                    entry.breaker.release_probe();
                    return Err(ServiceError::Cancelled);
                }
                Err(error) if error.is_retryable() && attempt < config.max_attempts => {
                    let delay = retry_delay(config, attempt, &error);
                    warn!(
                        operation = operation_id,
                        error = %error,
                        attempt,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure, backing off"
                    );
                    entry
                        .metrics
                        .failures_transient
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    // Terminal: permanent failure or attempts exhausted.
                    record_terminal_failure(entry, &error);
                    entry.breaker.record_failure();

                    if error.is_fallback_eligible()
                        && let Some(produce) = fallback
                    {
                        warn!(
                            operation = operation_id,
                            error = %error,
                            attempts = attempt,
                            "work failed, returning typed fallback"
                        );
                        entry
                            .metrics
                            .fallback_invocations
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        return Ok(Executed {
                            value: produce(),
                            degraded: true,
                            attempts: attempt,
                        });
                    }

                    return Err(error);
                }
            }
        }

        unreachable!("retry loop always returns")
    }

    /// Snapshot of every registered operation's metrics, sorted by id.
    pub fn metrics(&self) -> Vec<(String, OperationMetricsSnapshot)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|pair| {
                let entry = pair.value();
                (
                    pair.key().clone(),
                    entry
                        .metrics
                        .snapshot(entry.breaker.state().as_str(), entry.breaker.transition_count()),
                )
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Operation ids whose breakers are currently open.
    pub fn open_breakers(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|pair| {
                pair.value().breaker.state() == super::circuit_breaker::CircuitState::Open
            })
            .map(|pair| pair.key().clone())
            .collect()
    }
}

fn record_terminal_failure(entry: &OperationEntry, error: &ServiceError) {
    use std::sync::atomic::Ordering;
    if error.is_retryable() {
        entry.metrics.failures_transient.fetch_add(1, Ordering::Relaxed);
    } else {
        entry.metrics.failures_permanent.fetch_add(1, Ordering::Relaxed);
    }
}

/// Backoff before the next attempt. Rate-limit hints are honored (capped
/// at the strategy's max backoff); everything else gets full jitter over
/// an exponential ceiling.
fn retry_delay(config: &StrategyConfig, attempt: u32, error: &ServiceError) -> Duration {
    if let ServiceError::RateLimited {
        retry_after_ms: Some(hint),
        ..
    } = error
    {
        return Duration::from_millis((*hint).min(config.max_backoff_ms));
    }
    let ceiling = config.backoff_ceiling(attempt).as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::config::ResilienceConfig;

    fn fast_config() -> ResilienceConfig {
        let mut config = ResilienceConfig::from_preset("simple");
        config.override_field(|s| {
            s.base_backoff_ms = 1;
            s.max_backoff_ms = 5;
            s.timeout_ms = 1_000;
        });
        config
    }

    fn orchestrator_with(config: ResilienceConfig) -> ResilienceOrchestrator {
        let orchestrator = ResilienceOrchestrator::new(config);
        orchestrator.register_operation("summarize", Strategy::Balanced);
        orchestrator
    }

    fn no_fallback() -> Option<Box<dyn FnOnce() -> String + Send>> {
        None
    }

    fn string_fallback() -> Option<Box<dyn FnOnce() -> String + Send>> {
        Some(Box::new(|| "fallback".to_string()))
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();

        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Ok::<_, ServiceError>("ok".to_string()) },
                no_fallback(),
            )
            .await
            .unwrap();

        assert_eq!(result.value, "ok");
        assert!(!result.degraded);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_unregistered_operation_is_internal_error() {
        let orchestrator = ResilienceOrchestrator::new(fast_config());
        let cancel = CancellationToken::new();
        let err = orchestrator
            .execute(
                "nope",
                &cancel,
                || async { Ok::<_, ServiceError>(1) },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(ServiceError::TransientAi("flaky".into()))
                        } else {
                            Ok("recovered".to_string())
                        }
                    }
                },
                no_fallback(),
            )
            .await
            .unwrap();

        assert_eq!(result.value, "recovered");
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = orchestrator
            .execute(
                "summarize",
                &cancel,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<String, _>(ServiceError::PermanentAi("rejected".into())) }
                },
                string_fallback(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::PermanentAi("rejected".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry for permanent");
    }

    #[tokio::test]
    async fn test_exhausted_transient_returns_fallback() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<String, _>(ServiceError::TransientAi("down".into())) }
                },
                string_fallback(),
            )
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.value, "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 3, "balanced = 3 attempts");
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_raises() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();

        let err = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Err::<String, _>(ServiceError::TransientAi("down".into())) },
                no_fallback(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TransientAi(_)));
    }

    #[tokio::test]
    async fn test_invalid_response_surfaces_instead_of_fallback() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = orchestrator
            .execute(
                "summarize",
                &cancel,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<String, _>(ServiceError::InvalidResponse("echo".into())) }
                },
                string_fallback(),
            )
            .await
            .unwrap_err();

        // Retried like a transient failure, but surfaced on exhaustion.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_breaker_opens_after_threshold_and_skips_work() {
        let mut config = fast_config();
        config.override_field(|s| {
            s.max_attempts = 1;
            s.failure_threshold = 5;
            s.cooldown_ms = 60_000;
        });
        let orchestrator = orchestrator_with(config);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        // Five consecutive failing executes trip the breaker.
        for _ in 0..5 {
            let result = orchestrator
                .execute(
                    "summarize",
                    &cancel,
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<String, _>(ServiceError::TransientAi("down".into())) }
                    },
                    string_fallback(),
                )
                .await
                .unwrap();
            assert!(result.degraded);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // The sixth execute must not invoke work at all.
        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok("never".to_string()) }
                },
                string_fallback(),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5, "work skipped while open");
        assert!(result.degraded);
        assert_eq!(result.value, "fallback");
        assert_eq!(result.attempts, 0);
        assert_eq!(orchestrator.open_breakers(), vec!["summarize".to_string()]);
    }

    #[tokio::test]
    async fn test_open_breaker_without_fallback_raises() {
        let mut config = fast_config();
        config.override_field(|s| {
            s.max_attempts = 1;
            s.failure_threshold = 1;
            s.cooldown_ms = 60_000;
        });
        let orchestrator = orchestrator_with(config);
        let cancel = CancellationToken::new();

        let _ = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Err::<String, _>(ServiceError::TransientAi("down".into())) },
                no_fallback(),
            )
            .await;

        let err = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Ok("never".to_string()) },
                no_fallback(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TransientAi(_)));
    }

    #[tokio::test]
    async fn test_breaker_recovers_through_half_open() {
        let mut config = fast_config();
        config.override_field(|s| {
            s.max_attempts = 1;
            s.failure_threshold = 1;
            s.cooldown_ms = 50;
            s.halfopen_required_successes = 1;
        });
        let orchestrator = orchestrator_with(config);
        let cancel = CancellationToken::new();

        let _ = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Err::<String, _>(ServiceError::TransientAi("down".into())) },
                no_fallback(),
            )
            .await;
        assert_eq!(orchestrator.open_breakers().len(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Probe succeeds, circuit closes.
        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Ok("back".to_string()) },
                no_fallback(),
            )
            .await
            .unwrap();
        assert!(!result.degraded);
        assert!(orchestrator.open_breakers().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let mut config = fast_config();
        config.override_field(|s| {
            s.max_attempts = 2;
            s.timeout_ms = 20;
        });
        let orchestrator = orchestrator_with(config);
        let cancel = CancellationToken::new();

        let result = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too slow".to_string())
                },
                string_fallback(),
            )
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.value, "fallback");
    }

    #[tokio::test]
    async fn test_cancellation_surfaces_without_fallback() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Ok("never".to_string()) },
                string_fallback(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Cancelled);
    }

    #[tokio::test]
    async fn test_rate_limit_hint_bounds_delay() {
        let config = StrategyConfig::preset(Strategy::Balanced);
        let delay = retry_delay(
            &config,
            1,
            &ServiceError::RateLimited {
                message: "slow down".into(),
                retry_after_ms: Some(60_000),
            },
        );
        assert_eq!(delay, Duration::from_millis(config.max_backoff_ms));

        let delay = retry_delay(
            &config,
            1,
            &ServiceError::RateLimited {
                message: "slow down".into(),
                retry_after_ms: Some(100),
            },
        );
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let orchestrator = orchestrator_with(fast_config());
        orchestrator.register_operation("summarize", Strategy::Balanced);
        orchestrator.register_operation("summarize", Strategy::Balanced);
        assert!(orchestrator.is_registered("summarize"));
        assert_eq!(orchestrator.metrics().len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_accumulate() {
        let orchestrator = orchestrator_with(fast_config());
        let cancel = CancellationToken::new();

        let _ = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Ok::<_, ServiceError>("ok".to_string()) },
                no_fallback(),
            )
            .await;
        let _ = orchestrator
            .execute(
                "summarize",
                &cancel,
                || async { Err::<String, _>(ServiceError::PermanentAi("no".into())) },
                no_fallback(),
            )
            .await;

        let metrics = orchestrator.metrics();
        let (id, snapshot) = &metrics[0];
        assert_eq!(id, "summarize");
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures_permanent, 1);
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.duration_ms.count, 2);
    }
}
