//! Authentication configuration.
//!
//! API keys come from `API_KEY` plus comma-separated `ADDITIONAL_API_KEYS`.
//! Whitespace is trimmed and empty entries skipped. Production and staging
//! refuse to start without at least one key; development with zero keys
//! enters open mode (every request is identified as `"development"`).

use serde::{Deserialize, Serialize};

use super::{ConfigError, environment::Environment};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Configured API keys. Never logged or serialized into responses.
    #[serde(default, skip_serializing)]
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Load keys from `API_KEY` and `ADDITIONAL_API_KEYS`.
    pub fn from_env() -> Self {
        let mut api_keys = Vec::new();
        if let Ok(primary) = std::env::var("API_KEY") {
            let primary = primary.trim();
            if !primary.is_empty() {
                api_keys.push(primary.to_string());
            }
        }
        if let Ok(extra) = std::env::var("ADDITIONAL_API_KEYS") {
            for key in extra.split(',') {
                let key = key.trim();
                if !key.is_empty() {
                    api_keys.push(key.to_string());
                }
            }
        }
        Self { api_keys }
    }

    pub fn validate(&self, environment: Environment) -> Result<(), ConfigError> {
        if environment.is_hardened() && self.api_keys.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{environment} requires at least one API key. \
                 Set API_KEY or ADDITIONAL_API_KEYS before starting the service."
            )));
        }
        Ok(())
    }
}
