//! Research pipeline data model — `StageResult`, `Evidence`, and the frozen
//! `ResearchBundle` consumed by the external report renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Ok,
    Partial,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source_url: String,
    pub source_name: String,
    pub reliability: f64,
    pub extracted_text: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub summary: String,
    pub evidence: Vec<Evidence>,
    pub gaps_identified: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_index: usize,
    pub stage_name: String,
    pub findings: Findings,
    pub status: StageStatus,
    pub error_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub session_id: String,
    pub query: String,
    pub stages: Vec<StageResult>,
    pub knowledge_base: Vec<Evidence>,
    pub final_conclusions: String,
    pub confidence_score: f64,
}
