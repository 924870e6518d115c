/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with a JSON array of translations
 * - `MockProvider::intermittent(n)` - Fails every nth request with a server error
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::unauthorized()` - Always fails with an authentication error
 *
 * A script of behaviors can be queued with `then_script`; each call consumes
 * one entry before falling back to the base behavior.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{BatchRequest, TranslationClient};
use crate::translation::units::{NumberedUnit, TranslatedUnit};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper JSON array
    Working,
    /// Returns the given text verbatim
    Fixed(String),
    /// Wraps the translations in prose and truncates the last one
    Malformed,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with a server error
    Failing,
    /// Always fails with an authentication error
    Unauthorized,
    /// Succeeds without any candidate content
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Panics inside the request, like a bug in a client would
    Panicking,
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior used when the script is exhausted
    behavior: MockBehavior,
    /// Behaviors consumed one per request before the base behavior
    script: Arc<Mutex<VecDeque<MockBehavior>>>,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, shared between clones
    requests: Arc<Mutex<Vec<BatchRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock provider returning fixed text
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock provider rejecting every key
    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    /// Create a slow mock provider
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Queue behaviors for the next requests
    pub fn then_script(self, behaviors: Vec<MockBehavior>) -> Self {
        self.script.lock().extend(behaviors);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().clone()
    }

    /// Numbers sent across all requests, in request order
    pub fn requested_numbers(&self) -> Vec<u32> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| serde_json::from_str::<Vec<NumberedUnit>>(&r.source_json).ok())
            .flatten()
            .map(|u| u.number)
            .collect()
    }

    /// Translation produced by the working behavior for one text
    pub fn translated_text(target_language: &str, text: &str) -> String {
        format!("[{}] {}", target_language, text)
    }

    /// Build the JSON array a well-behaved model would return for a batch
    pub fn generate_batch_response(request: &BatchRequest) -> Result<Vec<TranslatedUnit>, ProviderError> {
        let units: Vec<NumberedUnit> = serde_json::from_str(&request.source_json)
            .map_err(|e| ProviderError::ParseError(format!("Mock could not read batch: {}", e)))?;

        Ok(units
            .into_iter()
            .map(|u| TranslatedUnit::new(u.number, Self::translated_text(&request.target_language, &u.text)))
            .collect())
    }

    fn to_json(units: &[TranslatedUnit]) -> Result<String, ProviderError> {
        serde_json::to_string(units).map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    fn next_behavior(&self) -> MockBehavior {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.behavior.clone())
    }
}

#[async_trait]
impl TranslationClient for MockProvider {
    async fn translate_batch(&self, request: &BatchRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match self.next_behavior() {
            MockBehavior::Working => Self::to_json(&Self::generate_batch_response(request)?),

            MockBehavior::Fixed(text) => Ok(text),

            MockBehavior::Malformed => {
                let units = Self::generate_batch_response(request)?;
                let mut text = String::from("Sure! Here are the translations:\n");
                for unit in &units {
                    text.push_str(&serde_json::json!({"number": unit.number, "text": unit.text}).to_string());
                    text.push('\n');
                }
                text.push_str(r#"{"number": 999999, "text": "cut o"#);
                Ok(text)
            }

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Self::to_json(&Self::generate_batch_response(request)?)
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::Empty => Err(ProviderError::EmptyResponse),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Self::to_json(&Self::generate_batch_response(request)?)
            }

            MockBehavior::Panicking => panic!("Simulated client panic (request #{})", count + 1),
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
