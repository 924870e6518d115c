/*!
 * Provider implementations for batch translation.
 *
 * This module contains client implementations for the supported LLM providers:
 * - Anthropic: Anthropic Messages API integration
 * - Ollama: Local LLM server
 * - Mock: Scripted provider for tests
 *
 * Every provider is reached through the `TranslationClient` trait: one call
 * takes a batch of units serialized as JSON and returns the raw model text.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Everything a provider needs to translate one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Caller-supplied API key; providers fall back to their configured key when empty
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Document title, given to the model as context
    pub title: String,
    /// Units of the chunk as a JSON array of `{number, text}`
    pub source_json: String,
    /// Target language tag
    pub target_language: String,
}

/// Common trait for all translation providers
///
/// Implementations return the model text untouched; parsing it is the
/// caller's concern. Only transport-level transient errors are retried.
#[async_trait]
pub trait TranslationClient: Send + Sync + Debug {
    /// Translate one batch and return the raw model output
    ///
    /// # Arguments
    /// * `request` - The batch to translate
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The model text or an error
    async fn translate_batch(&self, request: &BatchRequest) -> Result<String, ProviderError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}

/// Bounded retry with exponential backoff for transient errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Base backoff time in milliseconds, doubled after every failed attempt
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Hard upper bound on attempts
    pub const MAX_ATTEMPTS: u32 = 5;

    /// Create a policy, clamping attempts to `1..=MAX_ATTEMPTS`
    pub fn new(max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, Self::MAX_ATTEMPTS),
            backoff_base_ms,
        }
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out
    pub async fn run<T, F, Fut>(&self, provider: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                    warn!(
                        "{} request failed: {} - attempt {}/{}, retrying in {}ms",
                        provider, e, attempt, self.max_attempts, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a reqwest transport error to the matching provider error
pub(crate) fn map_transport_error(error: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Build the client for the active provider of a configuration
pub fn client_from_config(config: &TranslationConfig) -> Result<Arc<dyn TranslationClient>> {
    let retry = RetryPolicy::new(config.common.max_attempts(), config.common.retry_backoff_ms);
    let timeout_secs = config.get_timeout_secs();

    let client: Arc<dyn TranslationClient> = match config.provider {
        TranslationProvider::Anthropic => Arc::new(
            anthropic::Anthropic::new(config.get_endpoint(), timeout_secs)
                .with_default_api_key(config.get_api_key())
                .with_generation(config.common.temperature, config.common.max_tokens)
                .with_retry(retry),
        ),
        TranslationProvider::Ollama => Arc::new(
            ollama::Ollama::from_url(&config.get_endpoint(), timeout_secs)?
                .with_generation(config.common.temperature, config.common.max_tokens)
                .with_retry(retry),
        ),
    };

    Ok(client)
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
