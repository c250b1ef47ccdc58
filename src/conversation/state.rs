//! Conversation state (C1) — the typed container for one session's evolving
//! understanding of a user's research request.
//!
//! Maps use `BTreeMap` rather than `HashMap` so that serialization has a
//! deterministic key order, matching the canonical-serialization contract:
//! `deserialize(serialize(s)) == s` with floats equal to six decimals.

use crate::error::InputError;
use crate::types::{clamp01, normalize_text, round6};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::mode::ConversationMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    OpenEnded,
    Clarification,
    Priority,
    Constraint,
    Preference,
    Validation,
    FollowUp,
}

/// A single asked-and-answered turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question_id: String,
    pub question_text: String,
    pub answer_text: String,
    pub question_type: QuestionType,
    pub category: String,
    pub asked_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
    pub priority_score: f64,
    pub follow_up_hint: Option<String>,
}

/// A question-only shell produced by the generator before an answer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswerShell {
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub category: String,
    pub priority_score: f64,
    pub follow_up_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUnderstanding {
    pub detected_topics: Vec<String>,
    pub technical_level: String,
    pub decision_complexity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalIndicator {
    pub intensity: f64,
    pub triggering_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalIndicators {
    pub urgency: EmotionalIndicator,
    pub anxiety: EmotionalIndicator,
    pub excitement: EmotionalIndicator,
}

/// A scalar or small list value stored in the user profile map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

/// Immutable snapshot handed to the research pipeline when the dialogue ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchContext {
    pub user_query: String,
    pub priority_factors: BTreeMap<String, f64>,
    pub information_gaps: Vec<String>,
    pub user_profile: BTreeMap<String, ProfileValue>,
    pub emotional_indicators: EmotionalIndicators,
    pub completion_confidence: f64,
    pub mode: ConversationMode,
}

/// Typed container for one session's identity and evolving understanding.
///
/// All mutators are total: they clamp or no-op rather than raise, except
/// construction itself, which rejects an empty query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub user_query: String,
    pub user_profile: BTreeMap<String, ProfileValue>,
    pub information_gaps: Vec<String>,
    pub priority_factors: BTreeMap<String, f64>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub question_history: Vec<QuestionAnswer>,
    pub context_understanding: ContextUnderstanding,
    pub emotional_indicators: EmotionalIndicators,
    pub completion_confidence: f64,
    pub conversation_mode: ConversationMode,
    pub next_question_suggestions: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a new session. Fails only when `query` is empty after trimming.
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Result<Self, InputError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(InputError::EmptyQuery);
        }
        let now = Utc::now();
        Ok(Self {
            session_id: session_id.into(),
            user_query: query,
            user_profile: BTreeMap::new(),
            information_gaps: Vec::new(),
            priority_factors: BTreeMap::new(),
            confidence_scores: BTreeMap::new(),
            question_history: Vec::new(),
            context_understanding: ContextUnderstanding::default(),
            emotional_indicators: EmotionalIndicators::default(),
            completion_confidence: 0.0,
            conversation_mode: ConversationMode::Adaptive,
            next_question_suggestions: Vec::new(),
            metadata: BTreeMap::new(),
            created_at: now,
            last_updated_at: now,
        })
    }

    pub fn add_qa(&mut self, qa: QuestionAnswer) {
        self.question_history.push(qa);
        self.touch();
    }

    pub fn update_profile(&mut self, key: impl Into<String>, value: ProfileValue) {
        self.user_profile.insert(key.into(), value);
        self.touch();
    }

    /// Add a gap, deduplicated by normalized text. No-op if already present.
    pub fn add_gap(&mut self, text: impl Into<String>) {
        let text = text.into();
        let normalized = normalize_text(&text);
        let already_present = self
            .information_gaps
            .iter()
            .any(|g| normalize_text(g) == normalized);
        if !already_present {
            self.information_gaps.push(text);
            self.touch();
        }
    }

    /// Set a priority weight, clamped to `[0, 1]`.
    pub fn set_priority(&mut self, factor: impl Into<String>, weight: f64) {
        self.priority_factors.insert(factor.into(), round6(clamp01(weight)));
        self.touch();
    }

    pub fn set_confidence_score(&mut self, dimension: impl Into<String>, value: f64) {
        self.confidence_scores.insert(dimension.into(), round6(clamp01(value)));
        self.touch();
    }

    /// Set completion confidence, clamped to `[0, 1]` and rounded to 6 decimals.
    pub fn set_completion_confidence(&mut self, value: f64) {
        self.completion_confidence = round6(clamp01(value));
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }

    /// Freeze the current understanding into an immutable research context.
    pub fn snapshot(&self) -> ResearchContext {
        ResearchContext {
            user_query: self.user_query.clone(),
            priority_factors: self.priority_factors.clone(),
            information_gaps: self.information_gaps.clone(),
            user_profile: self.user_profile.clone(),
            emotional_indicators: self.emotional_indicators.clone(),
            completion_confidence: self.completion_confidence,
            mode: self.conversation_mode,
        }
    }

    /// Canonical JSON serialization: deterministic key order via `BTreeMap`,
    /// floats pre-rounded to 6 decimals by the mutators above.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
