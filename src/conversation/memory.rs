//! Conversation memory (C2) — deduplicates questions across a session,
//! accumulates response-pattern evidence, and estimates per-question
//! effectiveness.
//!
//! Fingerprinting and duplicate detection follow the keyword-overlap
//! technique the teacher uses for contradiction detection: normalize text,
//! strip stop words, then compare token sets with Jaccard similarity.

use crate::persistence;
use crate::types::{clamp01, normalize_text, round6};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "do", "does", "did", "of", "to", "in", "on",
    "for", "with", "and", "or", "what", "which", "how", "why", "when", "where", "who", "your",
    "you", "i", "it", "this", "that", "can", "could", "would", "should", "will",
];

const UNCERTAINTY_MARKERS: &[&str] = &["maybe", "not sure", "i think", "perhaps", "possibly"];

/// Per-question effectiveness, shared across sessions by fingerprint. Never
/// points back to a session — a forward-only registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetrics {
    pub question_fingerprint: String,
    pub times_asked: usize,
    pub average_response_length: f64,
    pub information_gain_estimate: f64,
    pub effectiveness_score: f64,
    pub last_session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Direct,
    Detailed,
    Questioning,
    Uncertain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePattern {
    pub communication_style: CommunicationStyle,
    pub question_asking_frequency: f64,
    pub avg_response_length: f64,
    pub uncertainty_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMemory {
    asked_fingerprints: HashSet<String>,
    asked_texts: Vec<String>,
    metrics: BTreeMap<String, QuestionMetrics>,
    answers_this_session: Vec<String>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable fingerprint for a question's normalized text, shared with
    /// callers (e.g. the question generator) that need a deterministic id.
    pub(crate) fn fingerprint(question_text: &str) -> String {
        let normalized = normalize_text(question_text);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Record that `question_text` was asked in `session_id`. Returns the
    /// stable fingerprint used to key [`QuestionMetrics`].
    pub fn track_asked(&mut self, question_text: &str, session_id: &str) -> String {
        let fingerprint = Self::fingerprint(question_text);
        self.asked_fingerprints.insert(fingerprint.clone());
        self.asked_texts.push(question_text.to_string());
        let metrics = self.metrics.entry(fingerprint.clone()).or_default();
        metrics.question_fingerprint = fingerprint.clone();
        metrics.times_asked += 1;
        metrics.last_session_id = session_id.to_string();
        fingerprint
    }

    /// `true` if `question_text` duplicates an already-asked question, either
    /// by exact normalized-text equality or by token Jaccard similarity above
    /// `similarity_threshold`.
    pub fn is_duplicate(&self, question_text: &str, similarity_threshold: f64) -> bool {
        let fingerprint = Self::fingerprint(question_text);
        if self.asked_fingerprints.contains(&fingerprint) {
            return true;
        }
        let candidate_tokens = content_tokens(question_text);
        if candidate_tokens.is_empty() {
            return false;
        }
        self.asked_texts
            .iter()
            .map(|t| content_tokens(t))
            .any(|asked_tokens| jaccard(&candidate_tokens, &asked_tokens) >= similarity_threshold)
    }

    /// Estimate effectiveness of `answer_text` for the question identified by
    /// `fingerprint`: a 0.4/0.4/0.2 blend of engagement (length), information
    /// gain (token novelty against prior answers this session), and domain
    /// relevance (domain-term hit ratio).
    pub fn record_answer(&mut self, fingerprint: &str, answer_text: &str) -> f64 {
        let engagement = clamp01(answer_text.len() as f64 / 150.0);

        let answer_tokens = content_tokens(answer_text);
        let novelty = if self.answers_this_session.is_empty() {
            1.0
        } else {
            let prior_tokens: HashSet<String> = self
                .answers_this_session
                .iter()
                .flat_map(|a| content_tokens(a))
                .collect();
            let novel: HashSet<&String> = answer_tokens.difference(&prior_tokens).collect();
            if answer_tokens.is_empty() {
                0.0
            } else {
                novel.len() as f64 / answer_tokens.len() as f64
            }
        };

        let relevance = domain_term_hit_ratio(answer_text);

        let effectiveness = round6(clamp01(0.4 * engagement + 0.4 * novelty + 0.2 * relevance));

        self.answers_this_session.push(answer_text.to_string());

        let metrics = self.metrics.entry(fingerprint.to_string()).or_default();
        metrics.question_fingerprint = fingerprint.to_string();
        let n = metrics.times_asked.max(1) as f64;
        metrics.average_response_length =
            (metrics.average_response_length * (n - 1.0) + answer_text.len() as f64) / n;
        metrics.information_gain_estimate = novelty;
        metrics.effectiveness_score = effectiveness;

        effectiveness
    }

    /// Derive an aggregate response-pattern signal from a session's
    /// question/answer history.
    pub fn derive_response_pattern(
        &self,
        answers: &[&str],
        question_marks_in_answers: usize,
    ) -> ResponsePattern {
        if answers.is_empty() {
            return ResponsePattern {
                communication_style: CommunicationStyle::Direct,
                question_asking_frequency: 0.0,
                avg_response_length: 0.0,
                uncertainty_ratio: 0.0,
            };
        }

        let total_len: usize = answers.iter().map(|a| a.len()).sum();
        let avg_response_length = total_len as f64 / answers.len() as f64;

        let question_ratio = question_marks_in_answers as f64 / answers.len() as f64;

        let uncertain_count = answers
            .iter()
            .filter(|a| {
                let lower = a.to_lowercase();
                UNCERTAINTY_MARKERS.iter().any(|m| lower.contains(m))
            })
            .count();
        let uncertainty_ratio = uncertain_count as f64 / answers.len() as f64;

        let style = if uncertainty_ratio > 0.3 {
            CommunicationStyle::Uncertain
        } else if question_ratio > 0.25 {
            CommunicationStyle::Questioning
        } else if avg_response_length > 120.0 {
            CommunicationStyle::Detailed
        } else if avg_response_length < 40.0 && question_marks_in_answers == 0 {
            CommunicationStyle::Direct
        } else {
            CommunicationStyle::Detailed
        };

        ResponsePattern {
            communication_style: style,
            question_asking_frequency: question_ratio,
            avg_response_length,
            uncertainty_ratio,
        }
    }

    /// Best-effort persistence. Failures degrade gracefully to in-memory only.
    pub fn persist(&self, path: &Path) {
        if let Err(err) = persistence::atomic_write_json(path, self) {
            tracing::warn!(error = %err, "failed to persist conversation memory, continuing in-memory");
        }
    }

    pub fn load(path: &Path) -> Self {
        match persistence::load_json(path) {
            Ok(Some(memory)) => memory,
            Ok(None) => Self::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load conversation memory, starting fresh");
                Self::new()
            }
        }
    }
}

fn content_tokens(text: &str) -> HashSet<String> {
    normalize_text(text)
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

const DOMAIN_TERMS: &[&str] = &[
    "budget", "cost", "price", "timeline", "deadline", "quality", "warranty", "feature",
    "brand", "model", "size", "capacity", "performance", "compatibility", "install",
];

fn domain_term_hit_ratio(text: &str) -> f64 {
    let tokens = content_tokens(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens.iter().filter(|t| DOMAIN_TERMS.contains(&t.as_str())).count();
    clamp01(hits as f64 / tokens.len() as f64 * 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_asked_then_exact_duplicate_detected() {
        let mut memory = ConversationMemory::new();
        memory.track_asked("What is your budget?", "s1");
        assert!(memory.is_duplicate("what is your budget", 0.85));
    }

    #[test]
    fn test_unrelated_question_not_duplicate() {
        let mut memory = ConversationMemory::new();
        memory.track_asked("What is your budget?", "s1");
        assert!(!memory.is_duplicate("When do you need it delivered?", 0.85));
    }

    #[test]
    fn test_record_answer_short_low_engagement() {
        let mut memory = ConversationMemory::new();
        let fp = memory.track_asked("Budget?", "s1");
        let score = memory.record_answer(&fp, "cheap");
        assert!(score < 0.5);
    }

    #[test]
    fn test_record_answer_long_detailed_higher_score() {
        let mut memory = ConversationMemory::new();
        let fp = memory.track_asked("Budget?", "s1");
        let answer = "My budget is around one thousand dollars and I care most about quality and warranty coverage for at least two years of use".repeat(1);
        let score = memory.record_answer(&fp, &answer);
        assert!(score > 0.3);
    }

    #[test]
    fn test_derive_response_pattern_detailed() {
        let memory = ConversationMemory::new();
        let answers = vec![
            "I would like something with a long battery life and great display quality for work",
            "Budget matters a lot to me and so does long term reliability of the brand",
        ];
        let pattern = memory.derive_response_pattern(&answers, 0);
        assert_eq!(pattern.communication_style, CommunicationStyle::Detailed);
    }

    #[test]
    fn test_derive_response_pattern_uncertain() {
        let memory = ConversationMemory::new();
        let answers = vec!["maybe", "not sure", "I think so", "ok"];
        let pattern = memory.derive_response_pattern(&answers, 0);
        assert_eq!(pattern.communication_style, CommunicationStyle::Uncertain);
    }
}
