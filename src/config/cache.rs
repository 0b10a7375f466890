//! Cache configuration.
//!
//! The cache is used for:
//! - Text-processing response caching (per-operation TTLs)
//! - At-rest encryption and compression of remote blobs
//! - Fingerprint-based key generation for large inputs
//!
//! All ranges are enforced at construction; a bad value fails startup.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Resolved cache configuration (preset + overrides, validated).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Preset name this configuration was derived from.
    #[serde(default = "default_preset_name")]
    pub preset: String,

    /// Default TTL in seconds for entries without an operation override.
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,

    /// Maximum number of entries in the in-memory (L1) tier.
    #[serde(default = "default_memory_cache_size")]
    pub memory_cache_size: usize,

    /// zlib level used when compression triggers.
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Serialized payloads at or above this many bytes are compressed.
    /// `None` disables compression entirely.
    #[serde(default)]
    pub compression_threshold: Option<usize>,

    /// Remote (Redis) tier connectivity. `None` runs L1-only.
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Fernet key (urlsafe-base64, 32 bytes) for at-rest encryption of
    /// remote blobs. Must parse as a valid Fernet key when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    /// AI-workload key generation and TTL behavior. Present for `ai-*`
    /// presets, absent otherwise.
    #[serde(default)]
    pub ai: Option<AiCacheConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            preset: default_preset_name(),
            default_ttl: default_ttl(),
            memory_cache_size: default_memory_cache_size(),
            compression_level: default_compression_level(),
            compression_threshold: Some(1024),
            redis: None,
            encryption_key: None,
            ai: None,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(60..=604_800).contains(&self.default_ttl) {
            return Err(ConfigError::Validation(format!(
                "cache.default_ttl must be between 60 and 604800 seconds, got {}",
                self.default_ttl
            )));
        }
        if !(1..=10_000).contains(&self.memory_cache_size) {
            return Err(ConfigError::Validation(format!(
                "cache.memory_cache_size must be between 1 and 10000, got {}",
                self.memory_cache_size
            )));
        }
        if !(1..=9).contains(&self.compression_level) {
            return Err(ConfigError::Validation(format!(
                "cache.compression_level must be between 1 and 9, got {}",
                self.compression_level
            )));
        }
        if let Some(threshold) = self.compression_threshold
            && threshold > 1_048_576
        {
            return Err(ConfigError::Validation(format!(
                "cache.compression_threshold must be at most 1048576 bytes, got {threshold}"
            )));
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        if let Some(key) = &self.encryption_key
            && fernet::Fernet::new(key).is_none()
        {
            return Err(ConfigError::Validation(
                "cache.encryption_key is not a valid Fernet key \
                 (expected 32 urlsafe-base64 bytes)"
                    .into(),
            ));
        }
        if let Some(ai) = &self.ai {
            ai.validate()?;
        }
        Ok(())
    }

    /// TTL for a specific operation tag, falling back to the default.
    pub fn ttl_for(&self, operation_tag: &str) -> u64 {
        self.ai
            .as_ref()
            .and_then(|ai| ai.operation_ttls.iter().find(|(tag, _)| tag == operation_tag))
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.default_ttl)
    }
}

/// Remote cache tier connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Connection URL: redis://[user:password@]host:port[/db]
    pub url: String,

    /// Password supplied out-of-band (`REDIS_PASSWORD`), merged into the
    /// URL at connect time when the URL carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Enable TLS (`rediss://`).
    #[serde(default)]
    pub use_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key_path: Option<String>,

    /// Maximum connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Per-operation connect/response timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl RedisConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation("cache.redis.url cannot be empty".into()));
        }
        if !(1..=100).contains(&self.max_connections) {
            return Err(ConfigError::Validation(format!(
                "cache.redis.max_connections must be between 1 and 100, got {}",
                self.max_connections
            )));
        }
        if !(1..=30).contains(&self.connection_timeout) {
            return Err(ConfigError::Validation(format!(
                "cache.redis.connection_timeout must be between 1 and 30 seconds, got {}",
                self.connection_timeout
            )));
        }
        Ok(())
    }
}

/// Text-size tier thresholds for key-generation metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSizeTiers {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

impl Default for TextSizeTiers {
    fn default() -> Self {
        Self {
            small: 1_000,
            medium: 5_000,
            large: 20_000,
        }
    }
}

/// AI-workload cache behavior: text fingerprinting thresholds and
/// per-operation TTL overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiCacheConfig {
    /// Inputs longer than this many characters are fingerprinted
    /// (SHA-256) instead of embedded verbatim in cache keys.
    #[serde(default = "default_text_hash_threshold")]
    pub text_hash_threshold: usize,

    #[serde(default)]
    pub text_size_tiers: TextSizeTiers,

    /// `(operation_tag, ttl_secs)` overrides.
    #[serde(default = "default_operation_ttls")]
    pub operation_ttls: Vec<(String, u64)>,

    /// When set, a remote hit larger than the compression threshold is not
    /// promoted into L1 on first access.
    #[serde(default)]
    pub smart_promotion: bool,
}

impl Default for AiCacheConfig {
    fn default() -> Self {
        Self {
            text_hash_threshold: default_text_hash_threshold(),
            text_size_tiers: TextSizeTiers::default(),
            operation_ttls: default_operation_ttls(),
            smart_promotion: false,
        }
    }
}

impl AiCacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=100_000).contains(&self.text_hash_threshold) {
            return Err(ConfigError::Validation(format!(
                "cache.ai.text_hash_threshold must be between 100 and 100000, got {}",
                self.text_hash_threshold
            )));
        }
        let tiers = &self.text_size_tiers;
        if tiers.small == 0 || tiers.small >= tiers.medium || tiers.medium >= tiers.large {
            return Err(ConfigError::Validation(
                "cache.ai.text_size_tiers must be strictly increasing positive integers \
                 (small < medium < large)"
                    .into(),
            ));
        }
        for (tag, ttl) in &self.operation_ttls {
            if !(60..=604_800).contains(ttl) {
                return Err(ConfigError::Validation(format!(
                    "cache.ai.operation_ttls[{tag}] must be between 60 and 604800 seconds, \
                     got {ttl}"
                )));
            }
        }
        Ok(())
    }
}

fn default_preset_name() -> String {
    "simple".to_string()
}

fn default_ttl() -> u64 {
    3600
}

fn default_memory_cache_size() -> usize {
    100
}

fn default_compression_level() -> u32 {
    6
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_text_hash_threshold() -> usize {
    1_000
}

fn default_operation_ttls() -> Vec<(String, u64)> {
    vec![
        ("summarize".to_string(), 7_200),
        ("sentiment".to_string(), 3_600),
        ("key_points".to_string(), 5_400),
        ("questions".to_string(), 4_800),
        ("qa".to_string(), 3_600),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        CacheConfig::default().validate().unwrap();
    }

    #[test]
    fn test_ttl_range_enforced() {
        let mut config = CacheConfig::default();
        config.default_ttl = 59;
        assert!(config.validate().is_err());
        config.default_ttl = 604_801;
        assert!(config.validate().is_err());
        config.default_ttl = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_size_range_enforced() {
        let mut config = CacheConfig::default();
        config.memory_cache_size = 0;
        assert!(config.validate().is_err());
        config.memory_cache_size = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compression_level_range() {
        let mut config = CacheConfig::default();
        config.compression_level = 0;
        assert!(config.validate().is_err());
        config.compression_level = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_encryption_key_rejected() {
        let mut config = CacheConfig::default();
        config.encryption_key = Some("not-a-fernet-key".into());
        assert!(config.validate().is_err());

        config.encryption_key = Some(fernet::Fernet::generate_key());
        config.validate().unwrap();
    }

    #[test]
    fn test_redis_connection_ranges() {
        let mut config = CacheConfig::default();
        config.redis = Some(RedisConfig {
            url: "redis://localhost:6379".into(),
            password: None,
            use_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
            max_connections: 101,
            connection_timeout: 5,
        });
        assert!(config.validate().is_err());

        if let Some(redis) = &mut config.redis {
            redis.max_connections = 10;
            redis.connection_timeout = 31;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_text_size_tiers_must_increase() {
        let mut config = CacheConfig::default();
        let mut ai = AiCacheConfig::default();
        ai.text_size_tiers = TextSizeTiers {
            small: 5_000,
            medium: 1_000,
            large: 20_000,
        };
        config.ai = Some(ai);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_operation_ttl_lookup() {
        let mut config = CacheConfig::default();
        config.ai = Some(AiCacheConfig::default());
        assert_eq!(config.ttl_for("summarize"), 7_200);
        assert_eq!(config.ttl_for("key_points"), 5_400);
        assert_eq!(config.ttl_for("unknown_op"), config.default_ttl);
    }

    #[test]
    fn test_ttl_for_without_ai_config_uses_default() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for("summarize"), 3_600);
    }
}
