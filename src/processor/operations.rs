//! Declarative operation registry.
//!
//! The operation table is a compile-time constant mapping each operation
//! to its prompt handler, resilience strategy, cache TTL, typed fallback
//! kind, and response shape. The registry validates the table once at
//! startup; a malformed table is an internal invariant violation, not a
//! configuration error.

use serde::{Deserialize, Serialize};

use super::types::{ResultValue, Sentiment, SentimentResult};
use crate::config::{CacheConfig, ResilienceConfig, Strategy, strategy_for};

/// Supported text-processing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Summarize,
    Sentiment,
    KeyPoints,
    Questions,
    Qa,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Summarize,
        Self::Sentiment,
        Self::KeyPoints,
        Self::Questions,
        Self::Qa,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Sentiment => "sentiment",
            Self::KeyPoints => "key_points",
            Self::Questions => "questions",
            Self::Qa => "qa",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Shape of an operation's result and its typed degraded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    Text,
    List,
    Sentiment,
}

impl FallbackKind {
    /// The typed degraded value returned when the primary path is
    /// unavailable.
    pub fn fallback_value(&self) -> ResultValue {
        match self {
            Self::Text => ResultValue::Text(
                "Service temporarily unavailable; please retry shortly.".to_string(),
            ),
            Self::List => ResultValue::Items(Vec::new()),
            Self::Sentiment => ResultValue::Sentiment(SentimentResult {
                sentiment: Sentiment::Neutral,
                confidence: 0.0,
                explanation: "degraded".to_string(),
            }),
        }
    }
}

/// Static metadata for one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub operation: Operation,
    /// Identifies the prompt builder + response shape.
    pub handler_id: &'static str,
    /// Canonical strategy under the production resilience preset; other
    /// presets remap uniformly.
    pub strategy: Strategy,
    pub cache_ttl_secs: u64,
    pub fallback: FallbackKind,
    pub requires_question: bool,
    /// Field name the HTTP layer uses when flattening the result.
    pub response_field: &'static str,
}

pub const OPERATIONS: [OperationSpec; 5] = [
    OperationSpec {
        operation: Operation::Summarize,
        handler_id: "prompt.summarize.v1",
        strategy: Strategy::Balanced,
        cache_ttl_secs: 7_200,
        fallback: FallbackKind::Text,
        requires_question: false,
        response_field: "summary",
    },
    OperationSpec {
        operation: Operation::Sentiment,
        handler_id: "prompt.sentiment.v1",
        strategy: Strategy::Aggressive,
        cache_ttl_secs: 3_600,
        fallback: FallbackKind::Sentiment,
        requires_question: false,
        response_field: "sentiment",
    },
    OperationSpec {
        operation: Operation::KeyPoints,
        handler_id: "prompt.key_points.v1",
        strategy: Strategy::Balanced,
        cache_ttl_secs: 5_400,
        fallback: FallbackKind::List,
        requires_question: false,
        response_field: "key_points",
    },
    OperationSpec {
        operation: Operation::Questions,
        handler_id: "prompt.questions.v1",
        strategy: Strategy::Balanced,
        cache_ttl_secs: 4_800,
        fallback: FallbackKind::List,
        requires_question: false,
        response_field: "questions",
    },
    OperationSpec {
        operation: Operation::Qa,
        handler_id: "prompt.qa.v1",
        strategy: Strategy::Conservative,
        cache_ttl_secs: 3_600,
        fallback: FallbackKind::Text,
        requires_question: true,
        response_field: "answer",
    },
];

/// Raised when the compile-time operation table is inconsistent. Fatal at
/// startup (exit code 70, internal invariant violation).
#[derive(Debug, thiserror::Error)]
#[error("operation registry invariant violated: {0}")]
pub struct RegistryError(String);

/// Operator-facing descriptor for `GET /v1/operations`.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub handler_id: &'static str,
    pub strategy: Strategy,
    pub cache_ttl_secs: u64,
    pub fallback_kind: FallbackKind,
    pub requires_question: bool,
    pub response_field: &'static str,
}

/// Validated dispatch table with preset-resolved strategies and
/// config-resolved TTLs.
pub struct OperationRegistry {
    specs: [OperationSpec; 5],
    strategies: [(Operation, Strategy); 5],
    ttls: [(Operation, u64); 5],
}

impl OperationRegistry {
    pub fn new(
        resilience: &ResilienceConfig,
        cache: &CacheConfig,
    ) -> Result<Self, RegistryError> {
        // Every enum variant appears exactly once.
        for operation in Operation::ALL {
            let count = OPERATIONS
                .iter()
                .filter(|s| s.operation == operation)
                .count();
            if count != 1 {
                return Err(RegistryError(format!(
                    "operation '{operation}' appears {count} times in the table"
                )));
            }
        }

        for spec in &OPERATIONS {
            if spec.handler_id.is_empty() || spec.response_field.is_empty() {
                return Err(RegistryError(format!(
                    "operation '{}' has unpopulated metadata",
                    spec.operation
                )));
            }
            if !(60..=604_800).contains(&spec.cache_ttl_secs) {
                return Err(RegistryError(format!(
                    "operation '{}' ttl {} outside 60..=604800",
                    spec.operation, spec.cache_ttl_secs
                )));
            }
            if spec.requires_question != (spec.operation == Operation::Qa) {
                return Err(RegistryError(format!(
                    "operation '{}' question requirement is inconsistent",
                    spec.operation
                )));
            }
            // The table documents the production assignment; drift between
            // the two would silently change breaker behavior.
            if spec.strategy != strategy_for("production", spec.operation.tag()) {
                return Err(RegistryError(format!(
                    "operation '{}' strategy disagrees with the production preset",
                    spec.operation
                )));
            }
        }

        let strategies = OPERATIONS.map(|spec| {
            (
                spec.operation,
                strategy_for(&resilience.preset, spec.operation.tag()),
            )
        });
        let ttls = OPERATIONS.map(|spec| {
            let ttl = if cache.ai.is_some() {
                cache.ttl_for(spec.operation.tag())
            } else {
                spec.cache_ttl_secs
            };
            (spec.operation, ttl)
        });

        Ok(Self {
            specs: OPERATIONS,
            strategies,
            ttls,
        })
    }

    pub fn spec(&self, operation: Operation) -> &OperationSpec {
        self.specs
            .iter()
            .find(|s| s.operation == operation)
            .expect("validated table covers all operations")
    }

    /// Preset-resolved strategy for an operation.
    pub fn strategy(&self, operation: Operation) -> Strategy {
        self.strategies
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, strategy)| *strategy)
            .expect("validated table covers all operations")
    }

    /// Config-resolved cache TTL for an operation.
    pub fn ttl(&self, operation: Operation) -> std::time::Duration {
        let secs = self
            .ttls
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, ttl)| *ttl)
            .expect("validated table covers all operations");
        std::time::Duration::from_secs(secs)
    }

    pub fn descriptors(&self) -> Vec<OperationDescriptor> {
        self.specs
            .iter()
            .map(|spec| OperationDescriptor {
                operation: spec.operation,
                handler_id: spec.handler_id,
                strategy: self.strategy(spec.operation),
                cache_ttl_secs: self.ttl(spec.operation).as_secs(),
                fallback_kind: spec.fallback,
                requires_question: spec.requires_question,
                response_field: spec.response_field,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiCacheConfig;

    fn registry(preset: &str) -> OperationRegistry {
        OperationRegistry::new(
            &ResilienceConfig::from_preset(preset),
            &CacheConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_table_passes_validation() {
        registry("production");
    }

    #[test]
    fn test_production_strategies() {
        let registry = registry("production");
        assert_eq!(registry.strategy(Operation::Qa), Strategy::Conservative);
        assert_eq!(registry.strategy(Operation::Sentiment), Strategy::Aggressive);
        assert_eq!(registry.strategy(Operation::Summarize), Strategy::Balanced);
    }

    #[test]
    fn test_development_strategies_uniform() {
        let registry = registry("development");
        for operation in Operation::ALL {
            assert_eq!(registry.strategy(operation), Strategy::Aggressive);
        }
    }

    #[test]
    fn test_ttls_without_ai_config_use_table() {
        let registry = registry("simple");
        assert_eq!(
            registry.ttl(Operation::Summarize),
            std::time::Duration::from_secs(7_200)
        );
        assert_eq!(
            registry.ttl(Operation::KeyPoints),
            std::time::Duration::from_secs(5_400)
        );
    }

    #[test]
    fn test_ttls_with_ai_overrides() {
        let mut cache = CacheConfig::default();
        let mut ai = AiCacheConfig::default();
        ai.operation_ttls = vec![("summarize".to_string(), 600)];
        cache.ai = Some(ai);
        let registry =
            OperationRegistry::new(&ResilienceConfig::from_preset("simple"), &cache).unwrap();

        assert_eq!(
            registry.ttl(Operation::Summarize),
            std::time::Duration::from_secs(600)
        );
        // No override falls back to the cache default, not the table.
        assert_eq!(
            registry.ttl(Operation::Sentiment),
            std::time::Duration::from_secs(3_600)
        );
    }

    #[test]
    fn test_only_qa_requires_question() {
        let registry = registry("simple");
        for operation in Operation::ALL {
            assert_eq!(
                registry.spec(operation).requires_question,
                operation == Operation::Qa
            );
        }
    }

    #[test]
    fn test_fallback_values() {
        assert_eq!(
            FallbackKind::Text.fallback_value(),
            ResultValue::Text("Service temporarily unavailable; please retry shortly.".into())
        );
        assert_eq!(FallbackKind::List.fallback_value(), ResultValue::Items(vec![]));
        match FallbackKind::Sentiment.fallback_value() {
            ResultValue::Sentiment(s) => {
                assert_eq!(s.sentiment, Sentiment::Neutral);
                assert_eq!(s.confidence, 0.0);
                assert_eq!(s.explanation, "degraded");
            }
            other => panic!("unexpected fallback: {other:?}"),
        }
    }

    #[test]
    fn test_descriptors_cover_all_operations() {
        let descriptors = registry("production").descriptors();
        assert_eq!(descriptors.len(), 5);
        assert!(descriptors.iter().any(|d| d.response_field == "answer"));
    }
}
