//! Error taxonomy for the dynamic research assistant core.
//!
//! Mirrors the propagation policy from the design: transient and malformed-response
//! LLM failures are recovered *inside* the component that issued the call and never
//! escape as errors — callers only observe degraded quality signals (lower confidence,
//! `FALLBACK` stage status). Only genuine invariant violations and caller-triggered
//! cancellation propagate as [`DraError`].

use thiserror::Error;

/// Top-level error type for the dynamic research assistant core.
#[derive(Debug, Error)]
pub enum DraError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("assessment error: {0}")]
    Assessment(#[from] AssessmentError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cancelled: {0}")]
    Cancelled(#[from] CancellationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected at session creation — no session is ever instantiated.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("query length {len} exceeds maximum {max}")]
    QueryTooLong { len: usize, max: usize },

    #[error("query failed safety sanitization: {reason}")]
    Unsafe { reason: String },

    #[error("field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

/// A state invariant was violated. Never raised for LLM failures.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("score out of range for {field}: {value} (expected 0.0..=1.0)")]
    ScoreOutOfRange { field: String, value: f64 },

    #[error("question budget exceeded: {asked} asked against a cap of {max}")]
    BudgetExceeded { asked: usize, max: usize },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Errors from settings validation at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("unsupported stage_count {value}, must be exactly 6")]
    UnsupportedStageCount { value: usize },
}

/// Cooperative cancellation. Always carries enough context for a partial snapshot.
#[derive(Debug, Error)]
pub enum CancellationError {
    #[error("session cancelled while asking for clarification")]
    DuringDialogue,

    #[error("session cancelled during research stage {stage}")]
    DuringResearch { stage: usize },
}

/// Errors surfaced by an [`crate::providers::LlmProvider`]. Recovered internally by
/// the calling component (C3/C4/C5/C8) via retry-then-fallback; never escapes
/// to the orchestrator as a [`DraError`].
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("rate limited by provider, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("response failed to parse or validate: {message}")]
    InvalidResponse { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl LlmError {
    /// Whether this failure should be retried with backoff (transient),
    /// as opposed to `InvalidResponse` which gets a single silent retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::RateLimit { .. } | LlmError::Transport { .. }
        )
    }
}

/// A type alias for results using the top-level [`DraError`].
pub type Result<T> = std::result::Result<T, DraError>;
