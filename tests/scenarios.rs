//! End-to-end scenarios for the dialogue-and-research pipeline, one per
//! concrete expectation in the design.

use dra_core::conversation::orchestrator::{ConversationUi, Orchestrator};
use dra_core::{CancellationError, ConversationMode, ResearchPipeline, Settings, StageStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

struct ScriptedUi {
    answers: Vec<&'static str>,
    idx: AtomicUsize,
}

impl ScriptedUi {
    fn new(answers: Vec<&'static str>) -> Self {
        Self { answers, idx: AtomicUsize::new(0) }
    }
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
async fn scenario_quick_urgent_purchase() {
    let settings = Settings::default();
    let orchestrator = Orchestrator::new(&settings, None);
    let ui = ScriptedUi::new(vec![
        "around five hundred dollars, nothing fancy",
        "I need it delivered by tomorrow",
        "no brand preference at all",
    ]);
    let cancel = CancellationToken::new();

    let outcome = orchestrator
        .run("DRA_QUICK", "need cheap laptop by tomorrow", &ui, &cancel)
        .await
        .unwrap();

    assert!(outcome.state.question_history.len() <= 3);
    assert!(outcome.context.is_some());

    let research_settings = settings.research.clone();
    let ai_settings = settings.ai.clone();
    let pipeline = ResearchPipeline::new(None, &research_settings, &ai_settings);
    let bundle = pipeline
        .run("DRA_QUICK", outcome.context.as_ref().unwrap(), &cancel)
        .await;

    assert_eq!(bundle.stages.len(), 6);
    assert!(bundle.confidence_score >= research_settings.min_confidence_fallback);
}

#[tokio::test]
async fn scenario_deep_comparison() {
    let settings = Settings::default();
    let orchestrator = Orchestrator::new(&settings, None);
    let ui = ScriptedUi::new(vec![
        "our budget is around thirty thousand dollars for the whole installation",
        "we would like this completed within the next six months",
        "quality and long term reliability of the panels matters most to us",
        "we are comparing three vendors so far",
    ]);
    let cancel = CancellationToken::new();

    let outcome = orchestrator
        .run(
            "DRA_DEEP",
            "compare options for a home solar installation for a four-person household",
            &ui,
            &cancel,
        )
        .await
        .unwrap();

    let context = outcome.context.expect("dialogue should finalize");
    assert_eq!(context.mode, ConversationMode::Deep);
    let high_weight_factors = context.priority_factors.values().filter(|w| **w >= 0.3).count();
    assert!(high_weight_factors >= 2);
}

#[tokio::test]
async fn scenario_llm_outage_falls_back_everywhere() {
    let settings = Settings::default();
    let orchestrator = Orchestrator::new(&settings, None);
    let ui = ScriptedUi::new(vec!["I'm not sure", "maybe soon", "I think it's fine"]);
    let cancel = CancellationToken::new();

    let outcome = orchestrator
        .run("DRA_OUTAGE", "need advice on a purchase", &ui, &cancel)
        .await
        .unwrap();

    let fingerprints: std::collections::HashSet<_> = outcome
        .state
        .question_history
        .iter()
        .map(|qa| qa.question_text.clone())
        .collect();
    assert_eq!(fingerprints.len(), outcome.state.question_history.len());

    let context = outcome.context.expect("dialogue should finalize even with no LLM");
    let research_settings = settings.research.clone();
    let ai_settings = settings.ai.clone();
    let pipeline = ResearchPipeline::new(None, &research_settings, &ai_settings);
    let bundle = pipeline.run("DRA_OUTAGE", &context, &cancel).await;

    assert!(bundle.stages.iter().all(|s| s.status == StageStatus::Fallback));
    assert_eq!(bundle.confidence_score, research_settings.min_confidence_fallback);
}

#[tokio::test]
async fn scenario_cancellation_during_research() {
    let settings = Settings::default();
    let research_settings = settings.research.clone();
    let ai_settings = settings.ai.clone();
    let pipeline = ResearchPipeline::new(None, &research_settings, &ai_settings);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let context = dra_core::ResearchContext {
        user_query: "need a laptop".into(),
        priority_factors: Default::default(),
        information_gaps: Vec::new(),
        user_profile: Default::default(),
        emotional_indicators: Default::default(),
        completion_confidence: 0.4,
        mode: dra_core::ConversationMode::Standard,
    };

    let bundle = pipeline.run("DRA_CANCEL", &context, &cancel).await;
    assert!(bundle.stages.iter().all(|s| s.status == StageStatus::Fallback));
    assert!(bundle.confidence_score >= research_settings.min_confidence_fallback);

    // Session state still round-trips after cancellation.
    let state = dra_core::ConversationState::new("DRA_CANCEL", "need a laptop").unwrap();
    let json = state.serialize().unwrap();
    let restored = dra_core::ConversationState::deserialize(&json).unwrap();
    assert_eq!(state, restored);
}

#[tokio::test]
async fn scenario_duplicate_suppression_generator() {
    use dra_core::conversation::memory::ConversationMemory;
    use dra_core::conversation::question_generator::generate_next_question;
    use std::time::Duration;

    let state = dra_core::ConversationState::new("DRA_DUP", "need cheap laptop by tomorrow").unwrap();
    let mut memory = ConversationMemory::new();
    let settings = Settings::default();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..5 {
        match generate_next_question(
            &state,
            &memory,
            None,
            &settings.ai_question_generation,
            Duration::from_secs(1),
        )
        .await
        {
            Some(shell) => {
                assert!(seen.insert(shell.question_text.clone()), "must never repeat a question");
                memory.track_asked(&shell.question_text, "DRA_DUP");
            }
            None => break,
        }
    }
}
