//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use dra_core::{clamp01, round6, ConversationState};

// --- Scalar helper properties ---

proptest! {
    #[test]
    fn clamp01_always_in_unit_interval(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let clamped = clamp01(value);
        prop_assert!((0.0..=1.0).contains(&clamped));
    }

    #[test]
    fn clamp01_is_identity_within_range(value in 0.0f64..=1.0) {
        prop_assert_eq!(clamp01(value), value);
    }

    #[test]
    fn round6_is_idempotent(value in -1000.0f64..1000.0) {
        let once = round6(value);
        let twice = round6(once);
        prop_assert_eq!(once, twice);
    }
}

// --- Conversation state invariants ---

proptest! {
    #[test]
    fn set_priority_always_clamped_and_rounded(
        weight in any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ) {
        let mut state = ConversationState::new("DRA_PROP", "need advice on a purchase").unwrap();
        state.set_priority("budget", weight);
        let stored = state.priority_factors["budget"];
        prop_assert!((0.0..=1.0).contains(&stored));
        prop_assert_eq!(stored, round6(clamp01(weight)));
    }

    #[test]
    fn set_completion_confidence_always_clamped(
        value in any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ) {
        let mut state = ConversationState::new("DRA_PROP", "need advice on a purchase").unwrap();
        state.set_completion_confidence(value);
        prop_assert!((0.0..=1.0).contains(&state.completion_confidence));
    }

    #[test]
    fn state_serialization_round_trips(
        weight in 0.0f64..1.0,
        confidence in 0.0f64..1.0,
    ) {
        let mut state = ConversationState::new("DRA_PROP", "need advice on a purchase").unwrap();
        state.set_priority("budget", weight);
        state.set_completion_confidence(confidence);

        let json = state.serialize().unwrap();
        let restored = ConversationState::deserialize(&json).unwrap();
        prop_assert_eq!(state, restored);
    }
}

// --- Research pipeline stage ordering ---

proptest! {
    #[test]
    fn stage_indices_are_always_one_through_six(seed in 0u8..6) {
        use dra_core::STAGES;
        let stage = STAGES[seed as usize];
        prop_assert_eq!(stage.index(), seed as usize + 1);
        prop_assert!(!stage.name().is_empty());
    }
}
