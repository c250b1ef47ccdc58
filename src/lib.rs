//! # Dynamic Research Assistant — core
//!
//! Core library for the consultative research assistant: an adaptive
//! clarification dialogue (the dynamic personalization engine, C1-C7) that
//! builds a rich user-intent profile, followed by a fixed six-stage LLM
//! research pipeline (C8) that progressively validates, compares,
//! synthesizes, and concludes.
//!
//! The core never constructs an LLM transport, a UI surface, or disk
//! persistence directly — it consumes each as a collaborator interface
//! (see [`providers`], [`conversation::orchestrator::ConversationUi`],
//! [`persistence`]).

pub mod conversation;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod sanitize;
pub mod settings;
pub mod types;

pub use error::{CancellationError, ConfigError, DraError, InputError, LlmError, Result, AssessmentError};
pub use providers::{GenerationOptions, LlmClient, LlmProvider, LlmResponse, MockLlmProvider, RetryPolicy};
pub use settings::Settings;
pub use types::{Role, clamp01, normalize_text, round6};

pub use conversation::completion_assessor::{AssessmentResult, Verdict};
pub use conversation::context_analyzer::{CommunicationStyle, ContextAnalysis, TechnicalExpertise};
pub use conversation::memory::{CommunicationStyle as MemoryCommunicationStyle, ConversationMemory, QuestionMetrics, ResponsePattern};
pub use conversation::mode::ConversationMode;
pub use conversation::mode_intelligence::ModeTransition;
pub use conversation::orchestrator::{ConversationUi, Orchestrator, OrchestratorOutcome, OrchestratorPhase};
pub use conversation::question_generator::{Domain, Intent};
pub use conversation::state::{
    ConversationState, EmotionalIndicator, EmotionalIndicators, ProfileValue, QuestionAnswer,
    QuestionAnswerShell, QuestionType, ResearchContext,
};

pub use research::bundle::{Evidence, Findings, ResearchBundle, StageResult, StageStatus};
pub use research::pipeline::ResearchPipeline;
pub use research::stage::{Stage, STAGES};

/// Generate a session identifier in the `DRA_YYYYMMDD_HHMMSS_micros` format.
pub fn new_session_id() -> String {
    let now = chrono::Utc::now();
    format!("DRA_{}", now.format("%Y%m%d_%H%M%S_%6f"))
}
