//! Configuration resolution for the orchestration core.
//!
//! A single named preset plus targeted environment overrides resolve into a
//! fully populated, validated [`CoreConfig`]. Precedence, highest first:
//!
//! 1. Explicit per-field environment overrides (`CACHE_DEFAULT_TTL`,
//!    `RESILIENCE_MAX_ATTEMPTS`, ...)
//! 2. Override file entries (JSON)
//! 3. Preset baseline
//! 4. Built-in defaults
//!
//! Resolution is fail-fast: any out-of-range value, unknown preset name, or
//! violated production invariant aborts startup with a [`ConfigError`].

mod ai;
mod auth;
mod cache;
mod environment;
mod presets;
mod resilience;
mod validator;

use std::path::{Path, PathBuf};

pub use ai::*;
pub use auth::*;
pub use cache::*;
pub use environment::*;
pub use presets::*;
pub use resilience::*;
use serde::{Deserialize, Serialize};
pub use validator::*;

/// Configuration errors. Fatal at startup (exit code 64).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Environment variable {0} is not valid: {1}")]
    EnvVar(&'static str, String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = env_string("HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORT")? {
            config.port = port;
        }
        Ok(config)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (`LOG_LEVEL`), e.g. `info` or
    /// `tessera=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Whether cache/resilience counters are exposed on the health surface.
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            monitoring_enabled: true,
        }
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(level) = env_string("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(format) = env_string("LOG_FORMAT") {
            config.format = match format.as_str() {
                "pretty" => LogFormat::Pretty,
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::EnvVar(
                        "LOG_FORMAT",
                        format!("unknown format '{other}' (expected pretty, compact, or json)"),
                    ));
                }
            };
        }
        if let Some(enabled) = env_bool("ENABLE_MONITORING")? {
            config.monitoring_enabled = enabled;
        }
        Ok(config)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Resolved, frozen configuration for the whole core. Created once at
/// process start and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub environment: Environment,
    pub cache: CacheConfig,
    pub resilience: ResilienceConfig,
    pub ai: AiConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Resolve configuration from presets, an optional JSON override file,
    /// and environment variables.
    pub fn resolve(override_file: Option<&Path>) -> Result<Self, ConfigError> {
        let detected = Environment::detect();
        let environment = detected.environment;
        let ai_cache_enabled = env_bool("ENABLE_AI_CACHE")?.unwrap_or(false);

        // Cache preset (explicit name, or `auto` from the detected environment)
        let preset_name = env_string("CACHE_PRESET").unwrap_or_else(|| "auto".to_string());
        let preset = if preset_name == "auto" {
            let recommendation = recommend_cache_preset(&detected, ai_cache_enabled);
            tracing::info!(
                preset = %recommendation.preset_name,
                confidence = recommendation.confidence,
                reasoning = %recommendation.reasoning,
                "Cache preset selected from environment"
            );
            cache_preset(&recommendation.preset_name).expect("recommended preset exists")
        } else {
            cache_preset(&preset_name).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "unknown cache preset '{preset_name}' (known: {})",
                    CACHE_PRESETS
                        .iter()
                        .map(|p| p.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?
        };
        let mut cache = preset.to_cache_config();

        // Resilience preset
        let resilience_preset = env_string("RESILIENCE_PRESET")
            .unwrap_or_else(|| recommend_resilience_preset(environment).to_string());
        if !RESILIENCE_PRESETS.contains(&resilience_preset.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown resilience preset '{resilience_preset}' (known: {})",
                RESILIENCE_PRESETS.join(", ")
            )));
        }
        let mut resilience = ResilienceConfig::from_preset(&resilience_preset);

        let mut ai = AiConfig::from_env();

        // Override file entries sit between the preset baseline and
        // per-field environment overrides.
        if let Some(path) = override_file {
            apply_override_file(path, &mut cache, &mut resilience, &mut ai)?;
        }

        apply_env_overrides(preset, &mut cache, &mut resilience, &mut ai)?;

        let config = CoreConfig {
            environment,
            cache,
            resilience,
            ai,
            auth: AuthConfig::from_env(),
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the resolved configuration for consistency and completeness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.resilience.validate()?;
        self.ai.validate()?;
        self.auth.validate(self.environment)?;

        // A hardened environment never writes plaintext blobs to a shared
        // remote store.
        if self.environment.is_hardened()
            && self.cache.redis.is_some()
            && self.cache.encryption_key.is_none()
        {
            return Err(ConfigError::Validation(format!(
                "{} with a remote cache requires REDIS_ENCRYPTION_KEY \
                 (urlsafe-base64 Fernet key)",
                self.environment
            )));
        }
        Ok(())
    }
}

/// Partial override file (JSON). Every field is optional; present fields
/// replace the preset baseline.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct OverrideFile {
    cache: CacheOverrides,
    resilience: ResilienceOverrides,
    ai: AiOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct CacheOverrides {
    default_ttl: Option<u64>,
    memory_cache_size: Option<usize>,
    compression_level: Option<u32>,
    compression_threshold: Option<usize>,
    redis_url: Option<String>,
    encryption_key: Option<String>,
    text_hash_threshold: Option<usize>,
    smart_promotion: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct ResilienceOverrides {
    max_attempts: Option<u32>,
    timeout_ms: Option<u64>,
    base_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    failure_threshold: Option<u32>,
    cooldown_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct AiOverrides {
    model: Option<String>,
    temperature: Option<f32>,
    max_input_chars: Option<usize>,
    batch_concurrency_limit: Option<usize>,
    max_batch_items: Option<usize>,
}

fn apply_override_file(
    path: &Path,
    cache: &mut CacheConfig,
    resilience: &mut ResilienceConfig,
    ai: &mut AiConfig,
) -> Result<(), ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e, path.to_path_buf()))?;
    let overrides: OverrideFile = serde_json::from_str(&contents)?;

    let c = overrides.cache;
    if let Some(v) = c.default_ttl {
        cache.default_ttl = v;
    }
    if let Some(v) = c.memory_cache_size {
        cache.memory_cache_size = v;
    }
    if let Some(v) = c.compression_level {
        cache.compression_level = v;
    }
    if let Some(v) = c.compression_threshold {
        cache.compression_threshold = Some(v);
    }
    if let Some(url) = c.redis_url {
        cache.redis = Some(RedisConfig {
            url,
            password: None,
            use_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
            max_connections: 10,
            connection_timeout: 5,
        });
    }
    if let Some(key) = c.encryption_key {
        cache.encryption_key = Some(key);
    }
    if c.text_hash_threshold.is_some() || c.smart_promotion.is_some() {
        let ai_cache = cache.ai.get_or_insert_with(AiCacheConfig::default);
        if let Some(v) = c.text_hash_threshold {
            ai_cache.text_hash_threshold = v;
        }
        if let Some(v) = c.smart_promotion {
            ai_cache.smart_promotion = v;
        }
    }

    let r = overrides.resilience;
    if let Some(v) = r.max_attempts {
        resilience.override_field(|s| s.max_attempts = v);
    }
    if let Some(v) = r.timeout_ms {
        resilience.override_field(|s| s.timeout_ms = v);
    }
    if let Some(v) = r.base_backoff_ms {
        resilience.override_field(|s| s.base_backoff_ms = v);
    }
    if let Some(v) = r.max_backoff_ms {
        resilience.override_field(|s| s.max_backoff_ms = v);
    }
    if let Some(v) = r.failure_threshold {
        resilience.override_field(|s| s.failure_threshold = v);
    }
    if let Some(v) = r.cooldown_ms {
        resilience.override_field(|s| s.cooldown_ms = v);
    }

    let a = overrides.ai;
    if let Some(v) = a.model {
        ai.model = v;
    }
    if let Some(v) = a.temperature {
        ai.temperature = v;
    }
    if let Some(v) = a.max_input_chars {
        ai.max_input_chars = v;
    }
    if let Some(v) = a.batch_concurrency_limit {
        ai.batch_concurrency_limit = v;
    }
    if let Some(v) = a.max_batch_items {
        ai.max_batch_items = v;
    }

    Ok(())
}

fn apply_env_overrides(
    preset: &CachePreset,
    cache: &mut CacheConfig,
    resilience: &mut ResilienceConfig,
    ai: &mut AiConfig,
) -> Result<(), ConfigError> {
    if let Some(v) = env_parse::<u64>("CACHE_DEFAULT_TTL")? {
        cache.default_ttl = v;
    }
    if let Some(v) = env_parse::<usize>("CACHE_MEMORY_SIZE")? {
        cache.memory_cache_size = v;
    }
    if let Some(v) = env_parse::<u32>("CACHE_COMPRESSION_LEVEL")? {
        cache.compression_level = v;
    }
    if let Some(v) = env_parse::<usize>("CACHE_COMPRESSION_THRESHOLD")? {
        cache.compression_threshold = Some(v);
    }
    if let Some(v) = env_parse::<usize>("CACHE_TEXT_HASH_THRESHOLD")? {
        cache
            .ai
            .get_or_insert_with(AiCacheConfig::default)
            .text_hash_threshold = v;
    }

    // Remote connectivity. Presets that disallow a remote tier (e.g.
    // `disabled`) ignore REDIS_URL.
    if preset.remote_allowed
        && let Some(url) = env_string("REDIS_URL")
    {
        let mut redis = cache.redis.take().unwrap_or(RedisConfig {
            url: url.clone(),
            password: None,
            use_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
            max_connections: 10,
            connection_timeout: 5,
        });
        redis.url = url;
        redis.password = env_string("REDIS_PASSWORD");
        if let Some(tls) = env_bool("USE_TLS")? {
            redis.use_tls = tls;
        }
        redis.tls_cert_path = env_string("TLS_CERT_PATH");
        redis.tls_key_path = env_string("TLS_KEY_PATH");
        if let Some(v) = env_parse::<u32>("CACHE_MAX_CONNECTIONS")? {
            redis.max_connections = v;
        }
        if let Some(v) = env_parse::<u64>("CACHE_CONNECTION_TIMEOUT")? {
            redis.connection_timeout = v;
        }
        cache.redis = Some(redis);
    }
    if let Some(key) = env_string("REDIS_ENCRYPTION_KEY") {
        cache.encryption_key = Some(key);
    }

    if let Some(v) = env_parse::<u32>("RESILIENCE_MAX_ATTEMPTS")? {
        resilience.override_field(|s| s.max_attempts = v);
    }
    if let Some(v) = env_parse::<u64>("RESILIENCE_TIMEOUT_MS")? {
        resilience.override_field(|s| s.timeout_ms = v);
    }
    if let Some(v) = env_parse::<u64>("RESILIENCE_BASE_BACKOFF_MS")? {
        resilience.override_field(|s| s.base_backoff_ms = v);
    }
    if let Some(v) = env_parse::<u64>("RESILIENCE_MAX_BACKOFF_MS")? {
        resilience.override_field(|s| s.max_backoff_ms = v);
    }
    if let Some(v) = env_parse::<u32>("RESILIENCE_FAILURE_THRESHOLD")? {
        resilience.override_field(|s| s.failure_threshold = v);
    }
    if let Some(v) = env_parse::<u64>("RESILIENCE_COOLDOWN_MS")? {
        resilience.override_field(|s| s.cooldown_ms = v);
    }

    if let Some(v) = env_parse::<usize>("MAX_INPUT_CHARS")? {
        ai.max_input_chars = v;
    }

    Ok(())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::EnvVar(name, e.to_string())),
        None => Ok(None),
    }
}

fn env_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_string(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(ConfigError::EnvVar(
                name,
                format!("expected a boolean, got '{other}'"),
            )),
        },
        None => Ok(None),
    }
}
