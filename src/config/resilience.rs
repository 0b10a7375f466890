//! Resilience configuration: retry, timeout, and circuit-breaker strategies.
//!
//! Every operation is bound to one of three strategies. The strategy table
//! is frozen at startup from a named preset; targeted environment overrides
//! (`RESILIENCE_MAX_ATTEMPTS`, `RESILIENCE_TIMEOUT_MS`, ...) apply uniformly
//! across strategies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Retry/breaker strategy tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fail fast: few attempts, short timeouts, quick breaker trips.
    Aggressive,
    /// Default tier for most operations.
    Balanced,
    /// Patient tier for high-value operations (long answers, QA).
    Conservative,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
        }
    }

    pub const ALL: [Strategy; 3] = [Self::Aggressive, Self::Balanced, Self::Conservative];
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen per-strategy tuning. Constructed from the preset table once at
/// startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_ms: u64,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub halfopen_required_successes: u32,
}

impl StrategyConfig {
    /// Built-in defaults for each strategy tier.
    pub fn preset(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Aggressive => Self {
                max_attempts: 2,
                base_backoff_ms: 100,
                max_backoff_ms: 1_000,
                timeout_ms: 5_000,
                failure_threshold: 3,
                cooldown_ms: 5_000,
                halfopen_required_successes: 1,
            },
            Strategy::Balanced => Self {
                max_attempts: 3,
                base_backoff_ms: 250,
                max_backoff_ms: 4_000,
                timeout_ms: 15_000,
                failure_threshold: 5,
                cooldown_ms: 15_000,
                halfopen_required_successes: 2,
            },
            Strategy::Conservative => Self {
                max_attempts: 5,
                base_backoff_ms: 500,
                max_backoff_ms: 15_000,
                timeout_ms: 45_000,
                failure_threshold: 8,
                cooldown_ms: 60_000,
                halfopen_required_successes: 3,
            },
        }
    }

    /// Exponential backoff ceiling for the given 1-based attempt number.
    /// The orchestrator sleeps a uniformly random duration in `[0, ceiling]`
    /// (full jitter).
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let raw = self.base_backoff_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(raw.min(self.max_backoff_ms))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    fn validate(&self, strategy: Strategy) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(format!(
                "resilience.{strategy}.max_attempts must be at least 1"
            )));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Validation(format!(
                "resilience.{strategy}.base_backoff_ms exceeds max_backoff_ms"
            )));
        }
        if self.failure_threshold == 0 || self.halfopen_required_successes == 0 {
            return Err(ConfigError::Validation(format!(
                "resilience.{strategy} thresholds must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Resolved resilience configuration: the preset name plus a fully
/// populated strategy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Preset name the table was derived from (`simple`, `development`,
    /// `production`).
    pub preset: String,

    pub aggressive: StrategyConfig,
    pub balanced: StrategyConfig,
    pub conservative: StrategyConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self::from_preset("simple")
    }
}

impl ResilienceConfig {
    pub fn from_preset(preset: &str) -> Self {
        Self {
            preset: preset.to_string(),
            aggressive: StrategyConfig::preset(Strategy::Aggressive),
            balanced: StrategyConfig::preset(Strategy::Balanced),
            conservative: StrategyConfig::preset(Strategy::Conservative),
        }
    }

    pub fn strategy(&self, strategy: Strategy) -> &StrategyConfig {
        match strategy {
            Strategy::Aggressive => &self.aggressive,
            Strategy::Balanced => &self.balanced,
            Strategy::Conservative => &self.conservative,
        }
    }

    /// Apply a uniform per-field override across all three strategies.
    pub fn override_field(&mut self, apply: impl Fn(&mut StrategyConfig)) {
        apply(&mut self.aggressive);
        apply(&mut self.balanced);
        apply(&mut self.conservative);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aggressive.validate(Strategy::Aggressive)?;
        self.balanced.validate(Strategy::Balanced)?;
        self.conservative.validate(Strategy::Conservative)?;
        Ok(())
    }
}
