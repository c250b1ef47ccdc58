//! Personalization orchestrator (C7) — the top-level ask/answer/assess loop
//! binding C1-C6, producing the frozen [`ResearchContext`] handed to the
//! research pipeline.

use crate::conversation::completion_assessor::{self, Verdict};
use crate::conversation::context_analyzer::{self, ContextAnalysis};
use crate::conversation::memory::ConversationMemory;
use crate::conversation::mode::ConversationMode;
use crate::conversation::mode_intelligence::{self, ModeTransition};
use crate::conversation::question_generator;
use crate::conversation::state::{ConversationState, ProfileValue, QuestionAnswer, ResearchContext};
use crate::error::{CancellationError, DraError};
use crate::providers::LlmClient;
use crate::sanitize::sanitize_input;
use crate::settings::Settings;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorPhase {
    Init,
    Asking,
    Assessing,
    Finalizing,
    Aborted,
}

/// Outbound UI dependency: presents a question to the user and receives an
/// answer, and reports advisory progress.
#[async_trait]
pub trait ConversationUi: Send + Sync {
    async fn present_question(&self, question_text: &str) -> Result<String, CancellationError>;
    async fn report_progress(&self, turn: usize, max_turns: usize);
}

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    llm: Option<&'a LlmClient>,
}

/// Outcome of running the dialogue loop to completion or abort.
pub struct OrchestratorOutcome {
    pub phase: OrchestratorPhase,
    pub state: ConversationState,
    pub context: Option<ResearchContext>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(settings: &'a Settings, llm: Option<&'a LlmClient>) -> Self {
        Self { settings, llm }
    }

    /// Run the INIT -> ASKING -> ASSESSING -> FINALIZING/ABORTED loop.
    pub async fn run(
        &self,
        session_id: &str,
        opening_query: &str,
        ui: &dyn ConversationUi,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorOutcome, DraError> {
        let span = info_span!("orchestrator_run", session_id = session_id);
        async {
            let outcome = self.run_inner(session_id, opening_query, ui, cancel).await;
            match &outcome {
                Ok(result) => info!(phase = ?result.phase, turns = result.state.question_history.len(), "orchestrator run finished"),
                Err(err) => info!(error = %err, "orchestrator run aborted"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        session_id: &str,
        opening_query: &str,
        ui: &dyn ConversationUi,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorOutcome, DraError> {
        let sanitized_query = sanitize_input(opening_query);
        let mut state = ConversationState::new(session_id, sanitized_query)?;
        let mut memory = ConversationMemory::new();

        state.conversation_mode = mode_intelligence::select_initial_mode(&state.user_query);

        let mut phase = OrchestratorPhase::Asking;
        let mut last_analysis: Option<ContextAnalysis> = None;
        let mut mode_switched_down_this_turn = false;

        loop {
            if cancel.is_cancelled() {
                phase = OrchestratorPhase::Aborted;
                return Ok(OrchestratorOutcome { phase, state, context: None });
            }

            match phase {
                OrchestratorPhase::Asking => {
                    let mode_settings = self
                        .settings
                        .dynamic_personalization
                        .conversation_modes
                        .for_mode(state.conversation_mode);
                    let deadline = Duration::from_secs_f64(self.settings.ai.response_timeout);

                    let shell = question_generator::generate_next_question(
                        &state,
                        &memory,
                        self.llm,
                        &self.settings.ai_question_generation,
                        deadline,
                    )
                    .await;

                    let Some(shell) = shell else {
                        phase = OrchestratorPhase::Assessing;
                        continue;
                    };

                    if state.question_history.len() >= mode_settings.max_questions {
                        phase = OrchestratorPhase::Assessing;
                        continue;
                    }

                    ui.report_progress(state.question_history.len(), mode_settings.max_questions).await;

                    let asked_at = chrono::Utc::now();
                    let answer_text = match ui.present_question(&shell.question_text).await {
                        Ok(answer) => sanitize_input(&answer),
                        Err(err) => {
                            return Err(DraError::Cancelled(err));
                        }
                    };

                    let fingerprint = memory.track_asked(&shell.question_text, session_id);
                    memory.record_answer(&fingerprint, &answer_text);

                    state.add_qa(QuestionAnswer {
                        question_id: shell.question_id,
                        question_text: shell.question_text,
                        answer_text: answer_text.clone(),
                        question_type: shell.question_type,
                        category: shell.category,
                        asked_at,
                        answered_at: chrono::Utc::now(),
                        priority_score: shell.priority_score,
                        follow_up_hint: shell.follow_up_hint,
                    });

                    let analysis = context_analyzer::analyze(
                        &state,
                        &self.settings.context_analysis.priority_analysis,
                        self.llm,
                    )
                    .await;
                    apply_analysis(&mut state, &analysis);

                    if state.question_history.len() >= 2 {
                        let has_unmet_gap = analysis.priorities.values().any(|p| p.weight > 0.5)
                            && !state.information_gaps.is_empty();
                        match mode_intelligence::evaluate_transition(&state, has_unmet_gap) {
                            ModeTransition::Up => state.conversation_mode = state.conversation_mode.step_up(),
                            ModeTransition::Down => {
                                state.conversation_mode = state.conversation_mode.step_down();
                                mode_switched_down_this_turn = true;
                            }
                            ModeTransition::None => {}
                        }
                    }

                    last_analysis = Some(analysis);
                    phase = OrchestratorPhase::Assessing;
                }

                OrchestratorPhase::Assessing => {
                    let mode_settings = self
                        .settings
                        .dynamic_personalization
                        .conversation_modes
                        .for_mode(state.conversation_mode);

                    let analysis = match last_analysis.take() {
                        Some(a) => a,
                        None => {
                            context_analyzer::analyze(
                                &state,
                                &self.settings.context_analysis.priority_analysis,
                                self.llm,
                            )
                            .await
                        }
                    };

                    let assessment =
                        completion_assessor::assess(&state, &analysis, &mode_settings, self.llm).await;

                    let next_confidence = monotonic_confidence(
                        state.completion_confidence,
                        assessment.confidence,
                        mode_switched_down_this_turn,
                    );
                    state.set_completion_confidence(next_confidence);
                    mode_switched_down_this_turn = false;

                    for gap in &assessment.reasoned_gaps {
                        state.add_gap(gap);
                    }

                    phase = match assessment.verdict {
                        Verdict::Continue if state.question_history.len() < mode_settings.max_questions => {
                            OrchestratorPhase::Asking
                        }
                        _ => OrchestratorPhase::Finalizing,
                    };
                }

                OrchestratorPhase::Finalizing => {
                    let context = state.snapshot();
                    return Ok(OrchestratorOutcome {
                        phase: OrchestratorPhase::Finalizing,
                        state,
                        context: Some(context),
                    });
                }

                OrchestratorPhase::Aborted | OrchestratorPhase::Init => unreachable!(),
            }
        }
    }
}

/// `completion_confidence` never decreases turn-over-turn unless this turn's
/// mode transition stepped the conversation down a level.
fn monotonic_confidence(prior: f64, recomputed: f64, mode_switched_down_this_turn: bool) -> f64 {
    if recomputed < prior && !mode_switched_down_this_turn {
        prior
    } else {
        recomputed
    }
}

fn apply_analysis(state: &mut ConversationState, analysis: &ContextAnalysis) {
    for (factor, detection) in &analysis.priorities {
        state.set_priority(factor, detection.weight);
        state.update_profile(factor, ProfileValue::Number(detection.weight));
    }
    state.emotional_indicators = analysis.emotional_indicators.clone();
    for gap in &analysis.information_gaps {
        state.add_gap(gap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedUi {
        answers: Vec<&'static str>,
        idx: AtomicUsize,
    }

    #[async_trait]
    impl ConversationUi for ScriptedUi {
        async fn present_question(&self, _question_text: &str) -> Result<String, CancellationError> {
            let i = self.idx.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers.get(i).copied().unwrap_or("no particular preference").to_string())
        }

        async fn report_progress(&self, _turn: usize, _max_turns: usize) {}
    }

    #[tokio::test]
    async fn test_orchestrator_reaches_finalizing_within_mode_cap() {
        let settings = Settings::default();
        let orchestrator = Orchestrator::new(&settings, None);
        let ui = ScriptedUi {
            answers: vec!["cheap is fine, around 500 dollars", "need it by tomorrow", "no brand preference"],
            idx: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();
        let outcome = orchestrator
            .run("DRA_TEST", "need cheap laptop by tomorrow", &ui, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.phase, OrchestratorPhase::Finalizing);
        assert!(outcome.state.question_history.len() <= 3);
        assert!(outcome.context.is_some());
    }

    #[test]
    fn test_monotonic_confidence_holds_the_floor_without_mode_down() {
        assert_eq!(monotonic_confidence(0.6, 0.4, false), 0.6);
    }

    #[test]
    fn test_monotonic_confidence_allows_drop_on_mode_down() {
        assert_eq!(monotonic_confidence(0.6, 0.4, true), 0.4);
    }

    #[test]
    fn test_monotonic_confidence_allows_increase() {
        assert_eq!(monotonic_confidence(0.4, 0.6, false), 0.6);
    }

    #[tokio::test]
    async fn test_orchestrator_aborts_on_precancelled_token() {
        let settings = Settings::default();
        let orchestrator = Orchestrator::new(&settings, None);
        let ui = ScriptedUi { answers: vec![], idx: AtomicUsize::new(0) };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = orchestrator.run("DRA_TEST", "need a laptop", &ui, &cancel).await.unwrap();
        assert_eq!(outcome.phase, OrchestratorPhase::Aborted);
    }
}
