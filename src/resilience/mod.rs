mod circuit_breaker;
mod metrics;
mod orchestrator;

pub use circuit_breaker::{BreakerConfig, BreakerRejection, CircuitBreaker, CircuitState};
pub use metrics::{HistogramSnapshot, OperationMetricsSnapshot};
pub use orchestrator::{Executed, ResilienceOrchestrator};
