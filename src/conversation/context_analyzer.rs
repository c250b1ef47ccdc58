//! Context analyzer (C3) — extracts priorities, emotional indicators,
//! communication style, technical expertise, and information gaps from a
//! conversation's accumulated answers.
//!
//! AI-first for information gaps with a rule-based fallback; every other
//! signal is computed directly from curated phrase lists, matching the
//! teacher's keyword-density approach in its contradiction/intelligence
//! modules.

use crate::conversation::state::{ConversationState, EmotionalIndicator, EmotionalIndicators};
use crate::error::LlmError;
use crate::providers::{GenerationOptions, LlmClient};
use crate::sanitize::escape_for_llm_prompt;
use crate::settings::PriorityAnalysisSettings;
use crate::types::clamp01;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationStyle {
    Analytical,
    Intuitive,
    Direct,
    Exploratory,
    Decisive,
    Uncertain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechnicalExpertise {
    Novice,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone)]
pub struct PriorityDetection {
    pub weight: f64,
    pub evidence_phrases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContextAnalysis {
    pub priorities: BTreeMap<String, PriorityDetection>,
    pub emotional_indicators: EmotionalIndicators,
    pub communication_style: CommunicationStyle,
    pub technical_expertise: TechnicalExpertise,
    pub information_gaps: Vec<String>,
    pub confidence: f64,
}

struct FactorPhrases {
    name: &'static str,
    phrases: &'static [&'static str],
}

const FACTORS: &[FactorPhrases] = &[
    FactorPhrases { name: "budget", phrases: &["budget", "cheap", "afford", "price", "cost", "expensive"] },
    FactorPhrases { name: "timeline", phrases: &["deadline", "asap", "urgent", "by tomorrow", "soon", "quickly"] },
    FactorPhrases { name: "quality", phrases: &["quality", "durable", "reliable", "best", "premium"] },
    FactorPhrases { name: "convenience", phrases: &["easy", "convenient", "simple", "hassle-free"] },
    FactorPhrases { name: "risk", phrases: &["risk", "safe", "warranty", "guarantee", "secure"] },
    FactorPhrases { name: "social", phrases: &["family", "friends", "recommend", "popular", "reviews"] },
    FactorPhrases { name: "learning", phrases: &["learn", "understand", "curious", "educational"] },
];

const URGENCY_PHRASES: &[&str] = &["asap", "urgent", "immediately", "right away", "by tomorrow", "emergency"];
const ANXIETY_PHRASES: &[&str] = &["worried", "anxious", "nervous", "concerned", "afraid"];
const EXCITEMENT_PHRASES: &[&str] = &["excited", "can't wait", "thrilled", "love the idea"];

const TECHNICAL_TERMS: &[&str] = &[
    "specification", "api", "bandwidth", "latency", "architecture", "throughput", "protocol",
];
const NOVICE_PHRASES: &[&str] = &["not sure what", "new to this", "don't know much", "first time"];
const EXPERT_PHRASES: &[&str] = &["i already know", "i've done this before", "experienced with"];
const UNCERTAINTY_MARKERS: &[&str] = &["maybe", "not sure", "i think", "perhaps"];

/// Analyze a conversation's answers into a [`ContextAnalysis`]. Total
/// function: on malformed LLM response for gap identification, falls back to
/// a rule-based pass and attenuates confidence by 0.7.
pub async fn analyze(
    state: &ConversationState,
    weights: &PriorityAnalysisSettings,
    llm: Option<&LlmClient>,
) -> ContextAnalysis {
    let answers: Vec<&str> = state
        .question_history
        .iter()
        .map(|qa| qa.answer_text.as_str())
        .collect();
    let combined = answers.join(" ");
    let lower = combined.to_lowercase();

    let priorities = detect_priorities(&lower, weights);
    let emotional_indicators = detect_emotions(&lower);
    let communication_style = detect_communication_style(&answers, &lower);
    let technical_expertise = detect_technical_expertise(&lower);

    let (information_gaps, mut confidence) =
        identify_gaps(state, &priorities, llm).await;

    let evidence_density = if priorities.is_empty() {
        0.3
    } else {
        clamp01(priorities.values().map(|p| p.weight).sum::<f64>() / priorities.len() as f64)
    };
    confidence = clamp01((confidence + evidence_density) / 2.0);

    ContextAnalysis {
        priorities,
        emotional_indicators,
        communication_style,
        technical_expertise,
        information_gaps,
        confidence,
    }
}

fn detect_priorities(lower: &str, weights: &PriorityAnalysisSettings) -> BTreeMap<String, PriorityDetection> {
    let mut result = BTreeMap::new();
    for factor in FACTORS {
        let hits: Vec<String> = factor
            .phrases
            .iter()
            .filter(|p| lower.contains(**p))
            .map(|p| p.to_string())
            .collect();
        if hits.is_empty() {
            continue;
        }
        let base_weight = match factor.name {
            "budget" => weights.budget_weight,
            "timeline" => weights.timeline_weight,
            "quality" => weights.quality_weight,
            "convenience" => weights.convenience_weight,
            _ => 0.5,
        };
        let density = clamp01(hits.len() as f64 * 0.2);
        let weight = clamp01(base_weight * 0.6 + density * 0.4);
        result.insert(
            factor.name.to_string(),
            PriorityDetection {
                weight,
                evidence_phrases: hits,
            },
        );
    }
    result
}

fn detect_emotions(lower: &str) -> EmotionalIndicators {
    EmotionalIndicators {
        urgency: phrase_intensity(lower, URGENCY_PHRASES),
        anxiety: phrase_intensity(lower, ANXIETY_PHRASES),
        excitement: phrase_intensity(lower, EXCITEMENT_PHRASES),
    }
}

fn phrase_intensity(lower: &str, phrases: &[&str]) -> EmotionalIndicator {
    let hits: Vec<String> = phrases.iter().filter(|p| lower.contains(**p)).map(|p| p.to_string()).collect();
    EmotionalIndicator {
        intensity: clamp01(hits.len() as f64 * 0.3),
        triggering_phrases: hits,
    }
}

fn detect_communication_style(answers: &[&str], lower: &str) -> CommunicationStyle {
    if answers.is_empty() {
        return CommunicationStyle::Exploratory;
    }
    let avg_len = answers.iter().map(|a| a.len()).sum::<usize>() as f64 / answers.len() as f64;
    let technical_ratio = term_hit_ratio(lower, TECHNICAL_TERMS);
    let uncertainty_hits = UNCERTAINTY_MARKERS.iter().filter(|m| lower.contains(**m)).count();
    let uncertainty_ratio = uncertainty_hits as f64 / answers.len() as f64;

    if uncertainty_ratio > 0.3 {
        CommunicationStyle::Uncertain
    } else if technical_ratio > 0.1 {
        CommunicationStyle::Analytical
    } else if avg_len < 40.0 {
        CommunicationStyle::Decisive
    } else if avg_len > 150.0 {
        CommunicationStyle::Exploratory
    } else if lower.contains("not sure") || lower.contains("maybe") {
        CommunicationStyle::Intuitive
    } else {
        CommunicationStyle::Direct
    }
}

fn detect_technical_expertise(lower: &str) -> TechnicalExpertise {
    if EXPERT_PHRASES.iter().any(|p| lower.contains(p)) || term_hit_ratio(lower, TECHNICAL_TERMS) > 0.15 {
        TechnicalExpertise::Expert
    } else if NOVICE_PHRASES.iter().any(|p| lower.contains(p)) {
        TechnicalExpertise::Novice
    } else {
        TechnicalExpertise::Intermediate
    }
}

fn term_hit_ratio(lower: &str, terms: &[&str]) -> f64 {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| lower.contains(**t)).count();
    clamp01(hits as f64 / tokens.len() as f64 * 5.0)
}

#[derive(Debug, Deserialize)]
struct GapResponse {
    gaps: Vec<String>,
}

/// AI-first gap identification with rule-based fallback. Returns
/// `(gaps, confidence_multiplier)` where the multiplier is 1.0 on success and
/// 0.7 on fallback, per the contract.
async fn identify_gaps(
    state: &ConversationState,
    priorities: &BTreeMap<String, PriorityDetection>,
    llm: Option<&LlmClient>,
) -> (Vec<String>, f64) {
    if let Some(client) = llm {
        let prompt = gap_prompt(state, priorities);
        match client.generate(&prompt, &GenerationOptions::default()).await {
            Ok(response) => match parse_gap_response(&response.text) {
                Ok(gaps) if !gaps.is_empty() => return (gaps, 1.0),
                _ => {}
            },
            Err(_) => {}
        }
    }
    (rule_based_gaps(state, priorities), 0.7)
}

/// Max characters of user-controlled text folded into a single prompt field.
const PROMPT_FIELD_MAX_LEN: usize = 4000;

fn gap_prompt(state: &ConversationState, priorities: &BTreeMap<String, PriorityDetection>) -> String {
    let query = escape_for_llm_prompt(&state.user_query, PROMPT_FIELD_MAX_LEN);
    format!(
        "Given the user's query \"{query}\" and detected priorities {:?}, list short free-form \
         descriptors of information still missing, as JSON: {{\"gaps\": [\"...\"]}}",
        priorities.keys().collect::<Vec<_>>()
    )
}

fn parse_gap_response(text: &str) -> Result<Vec<String>, LlmError> {
    serde_json::from_str::<GapResponse>(text)
        .map(|r| r.gaps)
        .map_err(|e| LlmError::InvalidResponse { message: e.to_string() })
}

/// Rule-based fallback: for each high-priority factor with insufficient
/// profile evidence, emit a gap descriptor naming *that* factor — never a
/// fixed taxonomy.
fn rule_based_gaps(state: &ConversationState, priorities: &BTreeMap<String, PriorityDetection>) -> Vec<String> {
    priorities
        .iter()
        .filter(|(_, detection)| detection.weight > 0.3)
        .filter(|(name, _)| !state.user_profile.contains_key(*name))
        .map(|(name, _)| format!("additional detail on {name} needed to refine recommendations"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::state::{QuestionAnswer, QuestionType};
    use chrono::Utc;

    fn qa(answer: &str) -> QuestionAnswer {
        QuestionAnswer {
            question_id: "q1".into(),
            question_text: "question".into(),
            answer_text: answer.into(),
            question_type: QuestionType::OpenEnded,
            category: "general".into(),
            asked_at: Utc::now(),
            answered_at: Utc::now(),
            priority_score: 0.5,
            follow_up_hint: None,
        }
    }

    #[tokio::test]
    async fn test_detects_budget_priority() {
        let mut state = ConversationState::new("s1", "need a laptop").unwrap();
        state.add_qa(qa("My budget is tight, I need something cheap"));
        let weights = PriorityAnalysisSettings::default();
        let analysis = analyze(&state, &weights, None).await;
        assert!(analysis.priorities.contains_key("budget"));
    }

    #[tokio::test]
    async fn test_fallback_gaps_are_not_fixed_taxonomy() {
        let mut state = ConversationState::new("s1", "need a laptop urgently").unwrap();
        state.add_qa(qa("I need it asap, budget is flexible but quality matters a lot"));
        let weights = PriorityAnalysisSettings::default();
        let analysis = analyze(&state, &weights, None).await;
        assert!(analysis.confidence <= 1.0);
        for gap in &analysis.information_gaps {
            assert!(gap.contains("needed to refine recommendations"));
        }
    }

    #[tokio::test]
    async fn test_uncertain_style_detected() {
        let mut state = ConversationState::new("s1", "query").unwrap();
        state.add_qa(qa("maybe, not sure, I think so"));
        let weights = PriorityAnalysisSettings::default();
        let analysis = analyze(&state, &weights, None).await;
        assert_eq!(analysis.communication_style, CommunicationStyle::Uncertain);
    }
}
