//! Client-side pacing for LLM calls.
//!
//! Adapted from the teacher's sliding-window token bucket, trimmed to the one
//! thing the core actually needs: a minimum delay between successive
//! `generate` calls (`ai.rate_limit_delay`), proactively enforced rather than
//! reacting to provider 429s. The core has no transport of its own, so there
//! are no response headers to parse here — a collaborator's provider surfaces
//! `LlmError::RateLimit` with a `retry_after_secs` when the provider itself
//! pushes back, and [`super::LlmClient`] honors that on top of this pacing.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum gap between consecutive calls.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Sleep, if necessary, so that at least `min_interval` has elapsed since
    /// the previous call to `wait`. Records the call regardless of outcome.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
