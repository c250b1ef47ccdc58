//! Shared scalar and text types used across the conversation and research layers.

use serde::{Deserialize, Serialize};

/// A participant role in an LLM prompt exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Clamp a value into `[0.0, 1.0]`.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round a float to 6 decimal places, matching the canonical serialization
/// rule for confidence/weight fields described in the data model.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Normalize text for fingerprinting/deduplication: lowercase, collapse
/// whitespace, strip terminal punctuation.
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let collapsed: Vec<&str> = lower.split_whitespace().collect();
    collapsed
        .join(" ")
        .trim_end_matches(|c: char| c == '?' || c == '.' || c == '!')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(0.42), 0.42);
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(0.123_456_789), 0.123457);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  What IS   the Budget?  "),
            "what is the budget"
        );
        assert_eq!(normalize_text("Cost?"), "cost");
    }

    #[test]
    fn test_normalize_text_idempotent_on_duplicates() {
        assert_eq!(
            normalize_text("What's your budget?"),
            normalize_text("What's your budget?")
        );
    }
}
