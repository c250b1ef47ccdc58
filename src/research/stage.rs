//! The six fixed research stages and their prompts.

use crate::conversation::state::ResearchContext;
use crate::research::bundle::StageResult;
use crate::sanitize::escape_for_llm_prompt;

/// Max characters of user-controlled text folded into a single prompt field.
const PROMPT_FIELD_MAX_LEN: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InformationGathering,
    ValidationFactChecking,
    ClarificationFollowUp,
    ComparativeAnalysis,
    SynthesisIntegration,
    FinalConclusions,
}

pub const STAGES: [Stage; 6] = [
    Stage::InformationGathering,
    Stage::ValidationFactChecking,
    Stage::ClarificationFollowUp,
    Stage::ComparativeAnalysis,
    Stage::SynthesisIntegration,
    Stage::FinalConclusions,
];

impl Stage {
    pub fn index(self) -> usize {
        match self {
            Stage::InformationGathering => 1,
            Stage::ValidationFactChecking => 2,
            Stage::ClarificationFollowUp => 3,
            Stage::ComparativeAnalysis => 4,
            Stage::SynthesisIntegration => 5,
            Stage::FinalConclusions => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::InformationGathering => "Information Gathering",
            Stage::ValidationFactChecking => "Validation & Fact-Checking",
            Stage::ClarificationFollowUp => "Clarification & Follow-up",
            Stage::ComparativeAnalysis => "Comparative Analysis",
            Stage::SynthesisIntegration => "Synthesis & Integration",
            Stage::FinalConclusions => "Final Conclusions",
        }
    }

    /// Build the per-stage prompt from the research context and the prior
    /// stages' results. A `FALLBACK` prior stage is treated as empty findings.
    pub fn prompt(self, context: &ResearchContext, prior: &[StageResult]) -> String {
        let prior_summary = prior
            .iter()
            .map(|s| {
                if s.status == crate::research::bundle::StageStatus::Fallback {
                    format!("Stage {}: (unavailable)", s.stage_index)
                } else {
                    let summary = escape_for_llm_prompt(&s.findings.summary, PROMPT_FIELD_MAX_LEN);
                    format!("Stage {}: {}", s.stage_index, summary)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let instruction = match self {
            Stage::InformationGathering => {
                "Gather broad evidence relevant to the query. Respond as JSON findings \
                 {summary, evidence: [{source_url, source_name, reliability, extracted_text, relevance}], gaps_identified}."
            }
            Stage::ValidationFactChecking => {
                "Validate the prior stage's evidence, flagging inconsistencies and unreliable \
                 sources. Respond as JSON findings with the same schema."
            }
            Stage::ClarificationFollowUp => {
                "Fill the gaps identified in prior stages via targeted re-query. Respond as \
                 JSON findings with the same schema."
            }
            Stage::ComparativeAnalysis => {
                "Enumerate the options under consideration and produce a comparison with \
                 pros/cons and numeric scores per criterion. Respond as JSON findings with the \
                 same schema; embed the comparison matrix in the summary."
            }
            Stage::SynthesisIntegration => {
                "Merge all prior findings into key insights. No new external lookups are \
                 required. Respond as JSON findings with the same schema."
            }
            Stage::FinalConclusions => {
                "Produce actionable recommendations, an implementation plan, a risk assessment, \
                 and success metrics. Respond as JSON findings with the same schema."
            }
        };

        let query = escape_for_llm_prompt(&context.user_query, PROMPT_FIELD_MAX_LEN);
        format!(
            "Query: {}\nMode: {}\nPriority factors: {:?}\nPrior stages:\n{}\n\n{}",
            query, context.mode, context.priority_factors, prior_summary, instruction
        )
    }
}
