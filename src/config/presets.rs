//! Preset catalog.
//!
//! A preset is a named, vetted bundle of configuration values. One preset
//! name replaces dozens of individual environment variables; targeted
//! overrides still apply on top (see [`super::CoreConfig::resolve`]).
//!
//! Cache presets: `disabled`, `minimal`, `simple`, `development`,
//! `production`, `ai-development`, `ai-production`, plus the pseudo-preset
//! `auto` which picks one from the detected environment.
//!
//! Resilience presets: `simple`, `development`, `production`, which bind
//! each operation to a strategy tier.

use serde::Serialize;

use super::{
    cache::{AiCacheConfig, CacheConfig},
    environment::{DetectedEnvironment, Environment},
    resilience::Strategy,
};

/// Static descriptor for a cache preset.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CachePreset {
    pub name: &'static str,
    pub description: &'static str,
    pub default_ttl: u64,
    pub memory_cache_size: usize,
    /// `(zlib level, byte threshold)`; `None` disables compression.
    pub compression: Option<(u32, usize)>,
    /// Whether the preset enables AI key-generation features.
    pub ai_optimized: bool,
    /// Whether the preset will attach a remote tier when `REDIS_URL` is set.
    pub remote_allowed: bool,
    pub environments: &'static [&'static str],
}

pub const CACHE_PRESETS: [CachePreset; 7] = [
    CachePreset {
        name: "disabled",
        description: "Tiny L1-only cache for test harnesses",
        default_ttl: 300,
        memory_cache_size: 10,
        compression: None,
        ai_optimized: false,
        remote_allowed: false,
        environments: &["testing"],
    },
    CachePreset {
        name: "minimal",
        description: "Small footprint for embedded or sidecar deployments",
        default_ttl: 900,
        memory_cache_size: 25,
        compression: None,
        ai_optimized: false,
        remote_allowed: true,
        environments: &["embedded"],
    },
    CachePreset {
        name: "simple",
        description: "Balanced defaults suitable anywhere",
        default_ttl: 3600,
        memory_cache_size: 100,
        compression: Some((6, 1024)),
        ai_optimized: false,
        remote_allowed: true,
        environments: &["any"],
    },
    CachePreset {
        name: "development",
        description: "Short TTLs and light compression for local iteration",
        default_ttl: 600,
        memory_cache_size: 50,
        compression: Some((3, 2048)),
        ai_optimized: false,
        remote_allowed: true,
        environments: &["development"],
    },
    CachePreset {
        name: "production",
        description: "Long TTLs, large L1, maximum compression",
        default_ttl: 7200,
        memory_cache_size: 500,
        compression: Some((9, 512)),
        ai_optimized: false,
        remote_allowed: true,
        environments: &["production", "staging"],
    },
    CachePreset {
        name: "ai-development",
        description: "AI key generation with development-friendly TTLs",
        default_ttl: 1800,
        memory_cache_size: 100,
        compression: Some((6, 1024)),
        ai_optimized: true,
        remote_allowed: true,
        environments: &["ai-development"],
    },
    CachePreset {
        name: "ai-production",
        description: "AI key generation tuned for production workloads",
        default_ttl: 14_400,
        memory_cache_size: 1000,
        compression: Some((9, 300)),
        ai_optimized: true,
        remote_allowed: true,
        environments: &["ai-production"],
    },
];

/// Look up a cache preset by name.
pub fn cache_preset(name: &str) -> Option<&'static CachePreset> {
    CACHE_PRESETS.iter().find(|p| p.name == name)
}

impl CachePreset {
    /// Materialize this preset into a baseline [`CacheConfig`].
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            preset: self.name.to_string(),
            default_ttl: self.default_ttl,
            memory_cache_size: self.memory_cache_size,
            compression_level: self.compression.map(|(level, _)| level).unwrap_or(6),
            compression_threshold: self.compression.map(|(_, threshold)| threshold),
            redis: None,
            encryption_key: None,
            ai: self.ai_optimized.then(AiCacheConfig::default),
        }
    }
}

/// Operator-facing preset descriptor (`tessera presets` and the internal
/// validation endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct PresetDetails {
    pub name: String,
    pub description: String,
    pub default_ttl: u64,
    pub memory_cache_size: usize,
    pub compression_level: Option<u32>,
    pub compression_threshold: Option<usize>,
    pub ai_optimized: bool,
    pub environments: Vec<String>,
}

/// Structured descriptor for a named cache preset, or `None` for an
/// unknown name.
pub fn get_preset_details(name: &str) -> Option<PresetDetails> {
    cache_preset(name).map(|p| PresetDetails {
        name: p.name.to_string(),
        description: p.description.to_string(),
        default_ttl: p.default_ttl,
        memory_cache_size: p.memory_cache_size,
        compression_level: p.compression.map(|(level, _)| level),
        compression_threshold: p.compression.map(|(_, threshold)| threshold),
        ai_optimized: p.ai_optimized,
        environments: p.environments.iter().map(|s| s.to_string()).collect(),
    })
}

/// Environment-based preset recommendation with confidence and reasoning.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentRecommendation {
    pub preset_name: String,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub reasoning: String,
    pub environment_detected: String,
}

/// Recommend a cache preset for a detected environment.
///
/// Exact environment-variable matches yield high confidence; substring
/// pattern matches medium; no signal falls back to development defaults
/// with low confidence.
pub fn recommend_cache_preset(
    detected: &DetectedEnvironment,
    ai_enabled: bool,
) -> EnvironmentRecommendation {
    let preset_name = match (detected.environment, ai_enabled) {
        (Environment::Production | Environment::Staging, true) => "ai-production",
        (Environment::Production | Environment::Staging, false) => "production",
        (Environment::Development, true) => "ai-development",
        (Environment::Development, false) => "development",
    };

    let (confidence, reasoning) = match (&detected.source, detected.exact) {
        (Some(var), true) => (
            0.95,
            format!(
                "{var}={} matched '{}' exactly",
                detected.raw.as_deref().unwrap_or(""),
                detected.environment
            ),
        ),
        (Some(var), false) => (
            0.70,
            format!(
                "{var}={} pattern-matched '{}'",
                detected.raw.as_deref().unwrap_or(""),
                detected.environment
            ),
        ),
        (None, _) => (
            0.40,
            "no environment signal found; assuming development".to_string(),
        ),
    };

    EnvironmentRecommendation {
        preset_name: preset_name.to_string(),
        confidence,
        reasoning,
        environment_detected: detected.environment.to_string(),
    }
}

/// Resilience preset names.
pub const RESILIENCE_PRESETS: [&str; 3] = ["simple", "development", "production"];

/// Strategy assignment for an operation tag under a named resilience
/// preset.
///
/// - `simple`: balanced everywhere
/// - `development`: aggressive everywhere (fail fast while iterating)
/// - `production`: conservative for qa, aggressive for sentiment,
///   balanced for everything else
pub fn strategy_for(preset: &str, operation_tag: &str) -> Strategy {
    match preset {
        "development" => Strategy::Aggressive,
        "production" => match operation_tag {
            "qa" => Strategy::Conservative,
            "sentiment" => Strategy::Aggressive,
            _ => Strategy::Balanced,
        },
        _ => Strategy::Balanced,
    }
}

/// Recommend a resilience preset for an environment.
pub fn recommend_resilience_preset(environment: Environment) -> &'static str {
    match environment {
        Environment::Production | Environment::Staging => "production",
        Environment::Development => "development",
    }
}
