//! LLM provider abstraction.
//!
//! The core consumes exactly one provider operation:
//! `generate(model, temperature, prompt) -> text`. Retries, timeouts, and
//! fallbacks live in the resilience layer, never here.

mod error;
mod gemini;

pub use error::ProviderError;
pub use gemini::GeminiClient;

use async_trait::async_trait;

/// One generated completion.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Total token count when the provider reports one.
    pub tokens: Option<u64>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
    ) -> Result<Generation, ProviderError>;
}
