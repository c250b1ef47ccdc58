//! Completion assessor (C5) — scores conversational sufficiency and decides
//! whether to continue, stop at a minimal bar, or stop fully.

use crate::conversation::context_analyzer::ContextAnalysis;
use crate::conversation::state::ConversationState;
use crate::error::LlmError;
use crate::providers::{GenerationOptions, LlmClient};
use crate::sanitize::escape_for_llm_prompt;
use crate::settings::ModeSettings;
use crate::types::clamp01;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    MinimalSufficient,
    Sufficient,
}

#[derive(Debug, Clone)]
pub struct AssessmentResult {
    pub confidence: f64,
    pub verdict: Verdict,
    pub reasoned_gaps: Vec<String>,
}

/// Assess sufficiency. Never fails on LLM trouble — falls back silently and
/// attenuates confidence by 0.85.
pub async fn assess(
    state: &ConversationState,
    analysis: &ContextAnalysis,
    mode_settings: &ModeSettings,
    llm: Option<&LlmClient>,
) -> AssessmentResult {
    let breadth = clamp01(
        state.priority_factors.values().filter(|w| **w > 0.3).count() as f64 / 4.0,
    );
    let depth = clamp01(
        state
            .question_history
            .iter()
            .map(|qa| qa.answer_text.len())
            .sum::<usize>() as f64
            / 600.0,
    );
    let progress = clamp01(state.question_history.len() as f64 / mode_settings.max_questions as f64);
    let gap_penalty = (0.1 * state.information_gaps.len() as f64).min(0.5);

    let mut confidence = clamp01(0.4 * breadth + 0.3 * depth + 0.3 * progress - gap_penalty);

    let asked = state.question_history.len();
    let verdict = if confidence >= 0.75
        || (asked >= mode_settings.max_questions && confidence >= 0.5)
    {
        Verdict::Sufficient
    } else if confidence >= 0.4 && asked >= mode_settings.min_questions.max(2) {
        Verdict::MinimalSufficient
    } else {
        Verdict::Continue
    };

    let (reasoned_gaps, used_llm) = reasoned_gap_list(state, analysis, llm).await;
    if !used_llm {
        confidence = clamp01(confidence * 0.85);
    }

    AssessmentResult {
        confidence,
        verdict,
        reasoned_gaps,
    }
}

/// Max characters of user-controlled text folded into a single prompt field.
const PROMPT_FIELD_MAX_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
struct GapListResponse {
    gaps: Vec<String>,
}

async fn reasoned_gap_list(
    state: &ConversationState,
    analysis: &ContextAnalysis,
    llm: Option<&LlmClient>,
) -> (Vec<String>, bool) {
    if let Some(client) = llm {
        let query = escape_for_llm_prompt(&state.user_query, PROMPT_FIELD_MAX_LEN);
        let prompt = format!(
            "List the remaining high-value information gaps for query \"{query}\" as JSON {{\"gaps\": [...]}}",
        );
        if let Ok(response) = client.generate(&prompt, &GenerationOptions::default()).await {
            if let Ok(parsed) = parse_gap_list(&response.text) {
                return (parsed, true);
            }
        }
    }
    let fallback: Vec<String> = analysis
        .priorities
        .iter()
        .filter(|(_, d)| d.weight > 0.3)
        .filter(|(name, _)| !state.user_profile.contains_key(*name))
        .map(|(name, _)| name.clone())
        .collect();
    (fallback, false)
}

fn parse_gap_list(text: &str) -> Result<Vec<String>, LlmError> {
    serde_json::from_str::<GapListResponse>(text)
        .map(|r| r.gaps)
        .map_err(|e| LlmError::InvalidResponse { message: e.to_string() })
}
