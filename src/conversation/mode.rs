//! Conversation mode: governs question budget and depth (C6 selects/switches it).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationMode {
    Quick,
    Standard,
    Deep,
    Adaptive,
}

impl std::fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationMode::Quick => write!(f, "QUICK"),
            ConversationMode::Standard => write!(f, "STANDARD"),
            ConversationMode::Deep => write!(f, "DEEP"),
            ConversationMode::Adaptive => write!(f, "ADAPTIVE"),
        }
    }
}

impl ConversationMode {
    /// The ordering used for upward/downward mode transitions (C6). `Adaptive`
    /// is treated as distinct from `Standard` per the decision recorded in
    /// DESIGN.md, and is excluded from the escalation ladder.
    pub fn step_up(self) -> Self {
        match self {
            ConversationMode::Quick => ConversationMode::Standard,
            ConversationMode::Standard => ConversationMode::Deep,
            ConversationMode::Deep => ConversationMode::Deep,
            ConversationMode::Adaptive => ConversationMode::Adaptive,
        }
    }

    pub fn step_down(self) -> Self {
        match self {
            ConversationMode::Deep => ConversationMode::Standard,
            ConversationMode::Standard => ConversationMode::Quick,
            ConversationMode::Quick => ConversationMode::Quick,
            ConversationMode::Adaptive => ConversationMode::Adaptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_settings_keys_uppercased() {
        assert_eq!(ConversationMode::Quick.to_string(), "QUICK");
        assert_eq!(ConversationMode::Adaptive.to_string(), "ADAPTIVE");
    }

    #[test]
    fn test_step_up_ladder() {
        assert_eq!(ConversationMode::Quick.step_up(), ConversationMode::Standard);
        assert_eq!(ConversationMode::Standard.step_up(), ConversationMode::Deep);
        assert_eq!(ConversationMode::Deep.step_up(), ConversationMode::Deep);
    }

    #[test]
    fn test_adaptive_does_not_enter_the_ladder() {
        assert_eq!(ConversationMode::Adaptive.step_up(), ConversationMode::Adaptive);
        assert_eq!(ConversationMode::Adaptive.step_down(), ConversationMode::Adaptive);
    }
}
