// Translation provider abstraction
//
// - Common: fixed instruction, empty-response retry, response line splitting
// - Gemini: Google Generative Language API client

pub mod common;
pub mod gemini;

use async_trait::async_trait;

pub use common::*;
use crate::config::TranslateConfig;
use crate::error::Result;

/// One completion request against a hosted language model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Send `text` to `model` with `api_key` and return the raw response text.
    /// Rate limit and quota failures surface as
    /// `ProviderRateLimited` / `ProviderQuotaExceeded`.
    async fn generate(&self, model: &str, api_key: &str, system_instruction: &str, text: &str) -> Result<String>;
}

/// Factory for creating provider instances
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the default provider (Gemini)
    pub fn create_provider(config: &TranslateConfig) -> Result<Box<dyn TranslationProvider>> {
        Ok(Box::new(gemini::GeminiProvider::new(config)?))
    }
}
