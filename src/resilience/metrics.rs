//! Per-operation resilience metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Histogram bucket upper bounds in milliseconds.
const DURATION_BOUNDS_MS: [u64; 7] = [10, 50, 100, 500, 1_000, 5_000, 15_000];

/// Live counters for one registered operation.
#[derive(Debug, Default)]
pub struct OperationMetrics {
    pub attempts: AtomicU64,
    pub successes: AtomicU64,
    pub failures_transient: AtomicU64,
    pub failures_permanent: AtomicU64,
    pub failures_timeout: AtomicU64,
    pub fallback_invocations: AtomicU64,
    durations: DurationHistogram,
}

#[derive(Debug, Default)]
struct DurationHistogram {
    // One bucket per bound plus an overflow bucket.
    buckets: [AtomicU64; DURATION_BOUNDS_MS.len() + 1],
    sum_ms: AtomicU64,
    count: AtomicU64,
}

impl OperationMetrics {
    pub fn record_duration_ms(&self, elapsed_ms: u64) {
        let histogram = &self.durations;
        let idx = DURATION_BOUNDS_MS
            .iter()
            .position(|bound| elapsed_ms <= *bound)
            .unwrap_or(DURATION_BOUNDS_MS.len());
        histogram.buckets[idx].fetch_add(1, Ordering::Relaxed);
        histogram.sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        histogram.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, circuit_state: &str, state_transitions: u64) -> OperationMetricsSnapshot {
        let histogram = &self.durations;
        OperationMetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures_transient: self.failures_transient.load(Ordering::Relaxed),
            failures_permanent: self.failures_permanent.load(Ordering::Relaxed),
            failures_timeout: self.failures_timeout.load(Ordering::Relaxed),
            fallback_invocations: self.fallback_invocations.load(Ordering::Relaxed),
            circuit_state: circuit_state.to_string(),
            circuit_transitions: state_transitions,
            duration_ms: HistogramSnapshot {
                bounds_ms: DURATION_BOUNDS_MS.to_vec(),
                buckets: histogram
                    .buckets
                    .iter()
                    .map(|b| b.load(Ordering::Relaxed))
                    .collect(),
                sum_ms: histogram.sum_ms.load(Ordering::Relaxed),
                count: histogram.count.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable point-in-time view of one operation's metrics.
#[derive(Debug, Clone, Serialize)]
pub struct OperationMetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures_transient: u64,
    pub failures_permanent: u64,
    pub failures_timeout: u64,
    pub fallback_invocations: u64,
    pub circuit_state: String,
    pub circuit_transitions: u64,
    pub duration_ms: HistogramSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    pub bounds_ms: Vec<u64>,
    /// One count per bound, plus a final overflow bucket.
    pub buckets: Vec<u64>,
    pub sum_ms: u64,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_buckets() {
        let metrics = OperationMetrics::default();
        metrics.record_duration_ms(5);
        metrics.record_duration_ms(75);
        metrics.record_duration_ms(600_000);

        let snapshot = metrics.snapshot("closed", 0);
        assert_eq!(snapshot.duration_ms.count, 3);
        assert_eq!(snapshot.duration_ms.sum_ms, 5 + 75 + 600_000);
        assert_eq!(snapshot.duration_ms.buckets[0], 1); // <= 10ms
        assert_eq!(snapshot.duration_ms.buckets[2], 1); // <= 100ms
        assert_eq!(*snapshot.duration_ms.buckets.last().unwrap(), 1); // overflow
    }

    #[test]
    fn test_bucket_boundary_is_inclusive() {
        let metrics = OperationMetrics::default();
        metrics.record_duration_ms(10);
        let snapshot = metrics.snapshot("closed", 0);
        assert_eq!(snapshot.duration_ms.buckets[0], 1);
    }
}
