//! Provider and request-shaping configuration.

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// Provider API key (`GEMINI_API_KEY`). Required for real model calls;
    /// absent only when the scripted test provider is wired in.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Model identifier passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature for all operations.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum input text length in characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Maximum question length for the qa operation.
    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,

    /// Bounded concurrency for batch fan-out.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency_limit: usize,

    /// Maximum items accepted in one batch request.
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_input_chars: default_max_input_chars(),
            max_question_chars: default_max_question_chars(),
            batch_concurrency_limit: default_batch_concurrency(),
            max_batch_items: default_max_batch_items(),
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                config.api_key = Some(key.to_string());
            }
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var("BATCH_CONCURRENCY_LIMIT")
            && let Ok(limit) = raw.trim().parse::<usize>()
        {
            config.batch_concurrency_limit = limit;
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=50).contains(&self.batch_concurrency_limit) {
            return Err(ConfigError::Validation(format!(
                "ai.batch_concurrency_limit must be between 1 and 50, got {}",
                self.batch_concurrency_limit
            )));
        }
        if self.max_batch_items == 0 || self.max_batch_items > 1_000 {
            return Err(ConfigError::Validation(format!(
                "ai.max_batch_items must be between 1 and 1000, got {}",
                self.max_batch_items
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "ai.temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::Validation(
                "ai.max_input_chars must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_input_chars() -> usize {
    100_000
}

fn default_max_question_chars() -> usize {
    2_000
}

fn default_batch_concurrency() -> usize {
    10
}

fn default_max_batch_items() -> usize {
    200
}
