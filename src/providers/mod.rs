//! LLM client abstraction.
//!
//! The core consumes a single operation — [`LlmProvider::generate`] — and never
//! constructs transport itself; a collaborator supplies the concrete provider
//! (HTTP client, local model, test double). [`LlmClient`] wraps a provider with
//! the retry/backoff and rate-limiting policy shared by every caller in the
//! core (C3, C4, C5, C8).

pub mod mock;
pub mod rate_limiter;

use crate::error::LlmError;
use async_trait::async_trait;
use rate_limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use mock::MockLlmProvider;

/// Generation parameters for a single [`LlmProvider::generate`] call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    pub deadline: Duration,
    pub enable_grounding: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 2048,
            deadline: Duration::from_secs(10),
            enable_grounding: false,
        }
    }
}

/// The result of a single generation call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub grounding_metadata: Option<serde_json::Value>,
}

/// A model-agnostic LLM provider. The core never constructs transport —
/// a collaborator supplies a concrete implementation over HTTP, a local
/// runtime, or (in tests) [`MockLlmProvider`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`. May fail with any [`LlmError`]
    /// variant; callers are responsible for retry/backoff via [`LlmClient`].
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<LlmResponse, LlmError>;

    /// Human-readable provider/model identifier, used in logs.
    fn name(&self) -> &str;
}

/// Retry/backoff policy applied uniformly across the core's LLM call sites.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub exponential_base: f64,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            exponential_base: 2.0,
            rate_limit_delay: Duration::from_secs(2),
        }
    }
}

/// Wraps an [`LlmProvider`] with exponential backoff, a client-side rate
/// limiter, and a single-writer discipline for shared use across sessions.
///
/// Transient errors ([`LlmError::Timeout`], [`LlmError::RateLimit`],
/// [`LlmError::Transport`]) are retried up to `max_retries` times with
/// exponential backoff (base `exponential_base`, seeded at `initial_delay`).
/// `LlmError::InvalidResponse` gets exactly one silent retry. Exhausted
/// retries are returned to the caller, which is expected to fall back to
/// deterministic behavior rather than propagate the error further.
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    limiter: tokio::sync::Mutex<RateLimiter>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            limiter: tokio::sync::Mutex::new(RateLimiter::new(policy.rate_limit_delay)),
            policy,
        }
    }

    /// Run `generate` with the retry/backoff policy applied. Returns the last
    /// error once `max_retries` attempts (for transient failures) or a single
    /// extra attempt (for invalid responses) have been exhausted.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<LlmResponse, LlmError> {
        {
            let mut limiter = self.limiter.lock().await;
            limiter.wait().await;
        }

        let mut last_err = None;
        let mut invalid_response_retried = false;

        for attempt in 0..=self.policy.max_retries {
            match self.provider.generate(prompt, options).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => {
                    warn!(
                        provider = self.provider.name(),
                        attempt, error = %err, "transient LLM failure"
                    );
                    last_err = Some(err.clone());
                    if attempt < self.policy.max_retries {
                        let delay = self.backoff_delay(attempt, &err);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
                Err(err) => {
                    // InvalidResponse: a single silent retry, then fallback.
                    debug!(provider = self.provider.name(), error = %err, "invalid LLM response");
                    last_err = Some(err);
                    if !invalid_response_retried {
                        invalid_response_retried = true;
                        continue;
                    }
                }
            }
            break;
        }

        Err(last_err.expect("loop always records an error before breaking"))
    }

    fn backoff_delay(&self, attempt: u32, err: &LlmError) -> Duration {
        if let LlmError::RateLimit { retry_after_secs } = err {
            return Duration::from_secs(*retry_after_secs).max(self.policy.rate_limit_delay);
        }
        let factor = self.policy.exponential_base.powi(attempt as i32);
        Duration::from_secs_f64(self.policy.initial_delay.as_secs_f64() * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockLlmProvider;

    #[tokio::test]
    async fn test_successful_generation_no_retry() {
        let provider = Arc::new(MockLlmProvider::with_responses(vec![Ok(LlmResponse {
            text: "hello".into(),
            grounding_metadata: None,
        })]));
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());
        let resp = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.text, "hello");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let provider = Arc::new(MockLlmProvider::with_responses(vec![
            Err(LlmError::Timeout { timeout_secs: 1 }),
            Err(LlmError::Timeout { timeout_secs: 1 }),
            Ok(LlmResponse {
                text: "recovered".into(),
                grounding_metadata: None,
            }),
        ]));
        let mut policy = RetryPolicy::default();
        policy.initial_delay = Duration::from_millis(1);
        let client = LlmClient::new(provider.clone(), policy);
        let resp = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.text, "recovered");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_returns_error() {
        let provider = Arc::new(MockLlmProvider::with_responses(vec![
            Err(LlmError::Timeout { timeout_secs: 1 }),
            Err(LlmError::Timeout { timeout_secs: 1 }),
            Err(LlmError::Timeout { timeout_secs: 1 }),
            Err(LlmError::Timeout { timeout_secs: 1 }),
        ]));
        let mut policy = RetryPolicy::default();
        policy.initial_delay = Duration::from_millis(1);
        policy.max_retries = 3;
        let client = LlmClient::new(provider.clone(), policy);
        let result = client.generate("prompt", &GenerationOptions::default()).await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_invalid_response_gets_single_silent_retry() {
        let provider = Arc::new(MockLlmProvider::with_responses(vec![
            Err(LlmError::InvalidResponse {
                message: "bad json".into(),
            }),
            Ok(LlmResponse {
                text: "fixed".into(),
                grounding_metadata: None,
            }),
        ]));
        let client = LlmClient::new(provider.clone(), RetryPolicy::default());
        let resp = client
            .generate("prompt", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.text, "fixed");
        assert_eq!(provider.call_count(), 2);
    }
}
