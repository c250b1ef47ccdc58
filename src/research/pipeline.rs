//! Research pipeline (C8) — runs the six fixed stages sequentially, feeding
//! each stage the structured output of prior stages, degrading to a
//! `FALLBACK` result per stage rather than aborting the bundle.

use crate::conversation::state::ResearchContext;
use crate::providers::{GenerationOptions, LlmClient};
use crate::research::bundle::{Evidence, Findings, ResearchBundle, StageResult, StageStatus};
use crate::research::stage::{Stage, STAGES};
use crate::settings::{AiSettings, ResearchSettings};
use crate::types::clamp01;
use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Deserialize)]
struct FindingsResponse {
    summary: String,
    #[serde(default)]
    evidence: Vec<EvidenceResponse>,
    #[serde(default)]
    gaps_identified: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EvidenceResponse {
    source_url: String,
    source_name: String,
    reliability: f64,
    extracted_text: String,
    relevance: f64,
}

pub struct ResearchPipeline<'a> {
    llm: Option<&'a LlmClient>,
    research_settings: &'a ResearchSettings,
    ai_settings: &'a AiSettings,
}

impl<'a> ResearchPipeline<'a> {
    pub fn new(
        llm: Option<&'a LlmClient>,
        research_settings: &'a ResearchSettings,
        ai_settings: &'a AiSettings,
    ) -> Self {
        Self { llm, research_settings, ai_settings }
    }

    /// Run all six stages. Each stage honors `cancel`; once cancelled, every
    /// remaining stage is filled with a `FALLBACK(reason="cancelled")`
    /// result rather than attempting the call.
    pub async fn run(
        &self,
        session_id: &str,
        context: &ResearchContext,
        cancel: &CancellationToken,
    ) -> ResearchBundle {
        let span = info_span!("research_pipeline_run", session_id = session_id);
        async {
            let mut results: Vec<StageResult> = Vec::with_capacity(6);

            for stage in STAGES {
                if cancel.is_cancelled() {
                    info!(stage = stage.index(), "research pipeline cancelled, filling remaining stages with fallback");
                    results.push(cancelled_result(stage));
                    continue;
                }
                let result = self.run_stage(stage, context, &results).await;
                results.push(result);
            }

            let knowledge_base: Vec<Evidence> = results.iter().flat_map(|r| r.findings.evidence.clone()).collect();
            let confidence_score = self.aggregate_confidence(&results, context.completion_confidence);

            let final_conclusions = results
                .last()
                .map(|r| r.findings.summary.clone())
                .unwrap_or_default();

            info!(
                stages_ok = results.iter().filter(|s| s.status == StageStatus::Ok).count(),
                confidence_score,
                "research pipeline run finished"
            );

            ResearchBundle {
                session_id: session_id.to_string(),
                query: context.user_query.clone(),
                stages: results,
                knowledge_base,
                final_conclusions,
                confidence_score,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stage(&self, stage: Stage, context: &ResearchContext, prior: &[StageResult]) -> StageResult {
        let started_at = Utc::now();
        let prompt = stage.prompt(context, prior);

        let Some(client) = self.llm else {
            return fallback_result(stage, started_at, "no LLM client configured");
        };

        match client.generate(&prompt, &GenerationOptions::default()).await {
            Ok(response) => match parse_findings(&response.text, self.research_settings.max_gaps_per_stage) {
                Some(findings) => {
                    // A stage that parsed cleanly but still reports unresolved gaps
                    // is a partial success: it produced usable findings, but the
                    // next stage inherits open questions rather than a clean slate.
                    let status = if findings.gaps_identified.is_empty() {
                        StageStatus::Ok
                    } else {
                        StageStatus::Partial
                    };
                    StageResult {
                        stage_index: stage.index(),
                        stage_name: stage.name().to_string(),
                        findings,
                        status,
                        error_reason: None,
                        started_at,
                        completed_at: Utc::now(),
                    }
                }
                None => {
                    debug!(stage = stage.index(), "stage response did not match the findings schema, falling back");
                    fallback_result(stage, started_at, "response did not match the findings schema")
                }
            },
            Err(err) => {
                warn!(stage = stage.index(), error = %err, "stage LLM call failed, falling back");
                fallback_result(stage, started_at, &err.to_string())
            }
        }
    }

    /// Blend of mean evidence reliability weighted by relevance, the
    /// completion share across stages (OK counts fully, PARTIAL counts at
    /// half), and the conversation's completion confidence, floored at
    /// `min_confidence_fallback`.
    fn aggregate_confidence(&self, stages: &[StageResult], completion_confidence: f64) -> f64 {
        let all_evidence: Vec<&Evidence> = stages.iter().flat_map(|s| s.findings.evidence.iter()).collect();
        let reliability = if all_evidence.is_empty() {
            0.0
        } else {
            let weighted: f64 = all_evidence.iter().map(|e| e.reliability * e.relevance).sum();
            let weight_sum: f64 = all_evidence.iter().map(|e| e.relevance).sum();
            if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 }
        };

        let completion_share: f64 = stages
            .iter()
            .map(|s| match s.status {
                StageStatus::Ok => 1.0,
                StageStatus::Partial => 0.5,
                StageStatus::Fallback => 0.0,
            })
            .sum::<f64>()
            / stages.len() as f64;

        let blended = clamp01(0.4 * reliability + 0.4 * completion_share + 0.2 * completion_confidence);
        blended.max(self.research_settings.min_confidence_fallback)
    }
}

fn parse_findings(text: &str, max_gaps: usize) -> Option<Findings> {
    let parsed: FindingsResponse = serde_json::from_str(text).ok()?;
    if parsed.summary.trim().is_empty() {
        return None;
    }
    let evidence = parsed
        .evidence
        .into_iter()
        .map(|e| Evidence {
            source_url: e.source_url,
            source_name: e.source_name,
            reliability: clamp01(e.reliability),
            extracted_text: e.extracted_text,
            relevance: clamp01(e.relevance),
        })
        .collect();
    let mut gaps = parsed.gaps_identified;
    gaps.truncate(max_gaps);
    Some(Findings { summary: parsed.summary, evidence, gaps_identified: gaps })
}

fn fallback_result(stage: Stage, started_at: chrono::DateTime<Utc>, reason: &str) -> StageResult {
    StageResult {
        stage_index: stage.index(),
        stage_name: stage.name().to_string(),
        findings: Findings {
            summary: format!("stage {} unavailable: {reason}", stage.index()),
            evidence: Vec::new(),
            gaps_identified: vec![format!("stage {} unavailable: {reason}", stage.index())],
        },
        status: StageStatus::Fallback,
        error_reason: Some(reason.to_string()),
        started_at,
        completed_at: Utc::now(),
    }
}

fn cancelled_result(stage: Stage) -> StageResult {
    let now = Utc::now();
    fallback_result(stage, now, "cancelled")
}
