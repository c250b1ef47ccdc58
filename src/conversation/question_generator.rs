//! AI question generator (C4) — produces the next clarifying question given
//! state and memory, falling back to deterministic templates when the LLM
//! fails or is disabled.

use crate::conversation::memory::ConversationMemory;
use crate::conversation::state::{ConversationState, QuestionAnswerShell, QuestionType};
use crate::providers::{GenerationOptions, LlmClient};
use crate::sanitize::escape_for_llm_prompt;
use crate::settings::AiQuestionGenerationSettings;
use crate::types::clamp01;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Purchase,
    Learning,
    Comparison,
    Research,
    Planning,
    Troubleshooting,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Technology,
    Health,
    Finance,
    Home,
    Travel,
    Education,
    Food,
    Other,
}

/// Classify intent. `RESEARCH` takes precedence over `LEARNING` when the word
/// "research" appears; `TROUBLESHOOTING` wins on explicit failure terms.
pub fn classify_intent(query: &str) -> Intent {
    let lower = query.to_lowercase();
    if word_matches(&lower, &["won't", "broken", "error", "doesn't work", "not working"]) {
        return Intent::Troubleshooting;
    }
    if word_matches(&lower, &["research"]) {
        return Intent::Research;
    }
    if word_matches(&lower, &["compare", "comparison", "versus", "vs"]) {
        return Intent::Comparison;
    }
    if word_matches(&lower, &["learn", "understand", "how does"]) {
        return Intent::Learning;
    }
    if word_matches(&lower, &["buy", "purchase", "need a", "looking for", "shopping"]) {
        return Intent::Purchase;
    }
    if word_matches(&lower, &["plan", "planning", "organize"]) {
        return Intent::Planning;
    }
    Intent::General
}

struct DomainKeywords {
    domain: Domain,
    keywords: &'static [&'static str],
}

// Ordered most-specific first; first match wins. Word-boundary matching
// prevents substring leaks (e.g. "app" inside "appliance").
const DOMAIN_TABLE: &[DomainKeywords] = &[
    DomainKeywords { domain: Domain::Health, keywords: &["health", "doctor", "medical", "symptom", "diet", "fitness"] },
    DomainKeywords { domain: Domain::Finance, keywords: &["finance", "investment", "loan", "mortgage", "tax", "retirement"] },
    DomainKeywords { domain: Domain::Travel, keywords: &["travel", "flight", "hotel", "vacation", "itinerary", "passport"] },
    DomainKeywords { domain: Domain::Education, keywords: &["course", "degree", "school", "university", "tutor", "curriculum"] },
    DomainKeywords { domain: Domain::Food, keywords: &["recipe", "restaurant", "meal", "cuisine", "ingredient"] },
    DomainKeywords { domain: Domain::Home, keywords: &["furniture", "kitchen", "room", "appliance", "renovation", "household", "solar installation", "solar"] },
    DomainKeywords { domain: Domain::Technology, keywords: &["software", "laptop", "computer", "app ", "api", "server", "technology"] },
];

pub fn classify_domain(query: &str) -> Domain {
    let lower = format!(" {} ", query.to_lowercase());
    for entry in DOMAIN_TABLE {
        if entry.keywords.iter().any(|kw| word_matches(&lower, &[kw])) {
            return entry.domain;
        }
    }
    Domain::Other
}

fn word_matches(haystack: &str, needles: &[&str]) -> bool {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<String, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
    needles.iter().any(|needle| {
        let mut map = cache.lock().unwrap();
        let re = map.entry(needle.to_string()).or_insert_with(|| {
            let escaped = regex::escape(needle.trim());
            Regex::new(&format!(r"(?i)\b{escaped}\b")).expect("valid regex")
        });
        re.is_match(haystack)
    })
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    text: String,
    #[serde(rename = "type")]
    question_type: String,
    category: String,
    priority: f64,
    #[allow(dead_code)]
    rationale: Option<String>,
}

/// Stable id derived from the question's normalized text, so identical
/// questions get the same id across sessions and ordering never matters.
fn question_id(question_text: &str) -> String {
    format!("q_{}", &ConversationMemory::fingerprint(question_text)[..12])
}

fn parse_question_type(raw: &str) -> QuestionType {
    match raw.to_uppercase().as_str() {
        "CLARIFICATION" => QuestionType::Clarification,
        "PRIORITY" => QuestionType::Priority,
        "CONSTRAINT" => QuestionType::Constraint,
        "PREFERENCE" => QuestionType::Preference,
        "VALIDATION" => QuestionType::Validation,
        "FOLLOW_UP" => QuestionType::FollowUp,
        _ => QuestionType::OpenEnded,
    }
}

/// Generate the next clarifying question. Returns `None` if no non-duplicate
/// question remains, or if `deadline` elapses before one can be produced.
pub async fn generate_next_question(
    state: &ConversationState,
    memory: &ConversationMemory,
    llm: Option<&LlmClient>,
    settings: &AiQuestionGenerationSettings,
    deadline: Duration,
) -> Option<QuestionAnswerShell> {
    let work = generate_inner(state, memory, llm, settings);
    match tokio::time::timeout(deadline, work).await {
        Ok(shell) => shell,
        Err(_) => None,
    }
}

async fn generate_inner(
    state: &ConversationState,
    memory: &ConversationMemory,
    llm: Option<&LlmClient>,
    settings: &AiQuestionGenerationSettings,
) -> Option<QuestionAnswerShell> {
    let intent = classify_intent(&state.user_query);
    let domain = classify_domain(&state.user_query);

    if let Some(client) = llm {
        let prompt = question_prompt(state, intent, domain);
        if let Ok(response) = client.generate(&prompt, &GenerationOptions {
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            ..GenerationOptions::default()
        }).await {
            if let Ok(parsed) = serde_json::from_str::<GeneratedQuestion>(&response.text) {
                if !parsed.text.trim().is_empty() && !memory.is_duplicate(&parsed.text, settings.duplicate_detection) {
                    return Some(QuestionAnswerShell {
                        question_id: question_id(&parsed.text),
                        question_text: parsed.text,
                        question_type: parse_question_type(&parsed.question_type),
                        category: parsed.category,
                        priority_score: clamp01(parsed.priority),
                        follow_up_hint: None,
                    });
                }
            }
        }
    }

    fallback_template(state, memory, intent)
}

/// Max characters of user-controlled text folded into a single prompt field.
const PROMPT_FIELD_MAX_LEN: usize = 4000;

fn question_prompt(state: &ConversationState, intent: Intent, domain: Domain) -> String {
    let query = escape_for_llm_prompt(&state.user_query, PROMPT_FIELD_MAX_LEN);
    let gaps: Vec<String> = state
        .information_gaps
        .iter()
        .map(|g| escape_for_llm_prompt(g, PROMPT_FIELD_MAX_LEN))
        .collect();
    format!(
        "Propose one clarifying question for a {intent:?}/{domain:?} query \"{query}\". \
         Current gaps: {gaps:?}. Respond as JSON {{\"text\",\"type\",\"category\",\"priority\",\"rationale\"}}.",
    )
}

/// Deterministic template table keyed by (intent, highest-priority unmet
/// gap). Templates are enumerated, not synthesized, and never introduce a
/// fresh duplicate — if every template has already been asked, returns
/// `None`.
fn fallback_template(
    state: &ConversationState,
    memory: &ConversationMemory,
    intent: Intent,
) -> Option<QuestionAnswerShell> {
    let gap_focus = state.information_gaps.first().cloned();

    let mut candidates: Vec<(String, QuestionType, String)> = match intent {
        Intent::Purchase => vec![
            ("What is your budget range for this?".into(), QuestionType::Constraint, "budget".into()),
            ("When do you need this by?".into(), QuestionType::Constraint, "timeline".into()),
            ("Do you have a preferred brand or model?".into(), QuestionType::Preference, "preference".into()),
        ],
        Intent::Comparison => vec![
            ("Which options are you currently comparing?".into(), QuestionType::Clarification, "options".into()),
            ("What criteria matter most in this comparison?".into(), QuestionType::Priority, "criteria".into()),
        ],
        Intent::Troubleshooting => vec![
            ("What exact error or symptom are you seeing?".into(), QuestionType::Clarification, "symptom".into()),
            ("When did this issue start happening?".into(), QuestionType::Clarification, "timeline".into()),
        ],
        Intent::Learning | Intent::Research => vec![
            ("What is your current familiarity with this topic?".into(), QuestionType::OpenEnded, "expertise".into()),
            ("What specifically would you like to understand better?".into(), QuestionType::OpenEnded, "focus".into()),
        ],
        Intent::Planning => vec![
            ("What is your target timeline for this plan?".into(), QuestionType::Constraint, "timeline".into()),
            ("Who else is involved in this decision?".into(), QuestionType::OpenEnded, "stakeholders".into()),
        ],
        Intent::General => vec![
            ("Can you tell me more about what you're looking for?".into(), QuestionType::OpenEnded, "general".into()),
        ],
    };

    if let Some(gap) = gap_focus {
        candidates.insert(0, (format!("Could you share more about {gap}?"), QuestionType::FollowUp, "gap".into()));
    }

    candidates
        .into_iter()
        .find(|(text, _, _)| !memory.is_duplicate(text, 0.85))
        .map(|(text, question_type, category)| QuestionAnswerShell {
            question_id: question_id(&text),
            question_text: text,
            question_type,
            category,
            priority_score: 0.5,
            follow_up_hint: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_beats_learning() {
        assert_eq!(classify_intent("I want to research machine learning"), Intent::Research);
    }

    #[test]
    fn test_troubleshooting_on_failure_terms() {
        assert_eq!(classify_intent("my laptop won't turn on"), Intent::Troubleshooting);
        assert_eq!(classify_intent("the app is broken"), Intent::Troubleshooting);
    }

    #[test]
    fn test_question_id_stable_and_content_derived() {
        assert_eq!(question_id("What is your budget?"), question_id("what is your budget?"));
        assert_ne!(question_id("What is your budget?"), question_id("When do you need this by?"));
    }

    #[test]
    fn test_domain_no_substring_leak() {
        assert_eq!(classify_domain("home furniture kitchen room appliance"), Domain::Home);
    }

    #[test]
    fn test_domain_technology() {
        assert_eq!(classify_domain("need a new laptop for software development"), Domain::Technology);
    }

    #[tokio::test]
    async fn test_fallback_never_duplicates() {
        let state = ConversationState::new("s1", "need cheap laptop by tomorrow").unwrap();
        let mut memory = ConversationMemory::new();
        let settings = AiQuestionGenerationSettings::default();

        let mut asked = Vec::new();
        for _ in 0..5 {
            match generate_next_question(&state, &memory, None, &settings, Duration::from_secs(1)).await {
                Some(shell) => {
                    memory.track_asked(&shell.question_text, "s1");
                    asked.push(shell.question_text);
                }
                None => break,
            }
        }
        let unique: std::collections::HashSet<_> = asked.iter().collect();
        assert_eq!(unique.len(), asked.len());
    }
}
