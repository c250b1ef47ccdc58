//! A deterministic [`LlmProvider`] for tests: scripted responses, optional
//! failure injection, call counting. Used throughout the conversation and
//! research test suites to exercise retry, fallback, and cancellation paths
//! without a network dependency.

use super::{GenerationOptions, LlmProvider, LlmResponse};
use crate::error::LlmError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockLlmProvider {
    scripted: Mutex<Vec<Result<LlmResponse, LlmError>>>,
    calls: AtomicUsize,
}

impl MockLlmProvider {
    /// Responses are returned in order, one per call. When exhausted, the
    /// last response is repeated indefinitely.
    pub fn with_responses(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            scripted: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that always returns the same canned text.
    pub fn always(text: impl Into<String>) -> Self {
        Self::with_responses(vec![Ok(LlmResponse {
            text: text.into(),
            grounding_metadata: None,
        })])
    }

    /// A provider that always fails with `err`.
    pub fn always_failing(err: LlmError) -> Self {
        Self::with_responses(vec![Err(err)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<LlmResponse, LlmError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.scripted.lock().unwrap();
        match scripted.get(index).or_else(|| scripted.last()) {
            Some(result) => result.clone(),
            None => Err(LlmError::Transport {
                message: "mock provider has no scripted responses".into(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_repeats_last_response_when_exhausted() {
        let provider = MockLlmProvider::always("canned");
        let opts = GenerationOptions::default();
        let first = provider.generate("p", &opts).await.unwrap();
        let second = provider.generate("p", &opts).await.unwrap();
        assert_eq!(first.text, "canned");
        assert_eq!(second.text, "canned");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_always_failing_repeats_error() {
        let provider = MockLlmProvider::always_failing(LlmError::Timeout { timeout_secs: 5 });
        let result = provider.generate("p", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
    }
}
