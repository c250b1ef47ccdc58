//! Settings schema for the dynamic research assistant core.
//!
//! Uses `figment` for layered configuration: built-in defaults -> optional
//! JSON file -> environment variables (`DRA_` prefix, `__` nesting), mirroring
//! the layering the teacher uses for its own agent configuration. Unknown
//! keys are ignored by `figment` extraction; numeric ranges are validated
//! explicitly after extraction since `figment` has no built-in range checks.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings record consumed by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub research: ResearchSettings,
    pub ai: AiSettings,
    pub dynamic_personalization: DynamicPersonalizationSettings,
    pub ai_question_generation: AiQuestionGenerationSettings,
    pub context_analysis: ContextAnalysisSettings,
    pub validation: ValidationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            research: ResearchSettings::default(),
            ai: AiSettings::default(),
            dynamic_personalization: DynamicPersonalizationSettings::default(),
            ai_question_generation: AiQuestionGenerationSettings::default(),
            context_analysis: ContextAnalysisSettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSettings {
    pub stage_count: usize,
    pub max_gaps_per_stage: usize,
    pub min_confidence_fallback: f64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            stage_count: 6,
            max_gaps_per_stage: 10,
            min_confidence_fallback: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSettings {
    pub max_retries: u32,
    pub retry_delay: f64,
    pub rate_limit_delay: f64,
    pub exponential_backoff_base: f64,
    pub response_timeout: f64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: 1.0,
            rate_limit_delay: 2.0,
            exponential_backoff_base: 2.0,
            response_timeout: 10.0,
        }
    }
}

/// Per-mode question budget and depth, keyed by [`crate::conversation::mode::ConversationMode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeSettings {
    pub min_questions: usize,
    pub max_questions: usize,
    pub time_sensitivity_threshold: f64,
    pub question_depth: QuestionDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionDepth {
    Surface,
    Moderate,
    Comprehensive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicPersonalizationSettings {
    pub conversation_modes: ConversationModeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationModeSettings {
    pub quick: ModeSettings,
    pub standard: ModeSettings,
    pub deep: ModeSettings,
    pub adaptive: ModeSettings,
}

impl Default for ConversationModeSettings {
    fn default() -> Self {
        Self {
            quick: ModeSettings {
                min_questions: 1,
                max_questions: 3,
                time_sensitivity_threshold: 0.8,
                question_depth: QuestionDepth::Surface,
            },
            standard: ModeSettings {
                min_questions: 3,
                max_questions: 6,
                time_sensitivity_threshold: 0.5,
                question_depth: QuestionDepth::Moderate,
            },
            deep: ModeSettings {
                min_questions: 4,
                max_questions: 12,
                time_sensitivity_threshold: 0.2,
                question_depth: QuestionDepth::Comprehensive,
            },
            adaptive: ModeSettings {
                min_questions: 3,
                max_questions: 8,
                time_sensitivity_threshold: 0.5,
                question_depth: QuestionDepth::Moderate,
            },
        }
    }
}

impl Default for DynamicPersonalizationSettings {
    fn default() -> Self {
        Self {
            conversation_modes: ConversationModeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiQuestionGenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    pub relevance_threshold: f64,
    pub duplicate_detection: f64,
}

impl Default for AiQuestionGenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 512,
            relevance_threshold: 0.5,
            duplicate_detection: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysisSettings {
    pub priority_analysis: PriorityAnalysisSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityAnalysisSettings {
    pub budget_weight: f64,
    pub timeline_weight: f64,
    pub quality_weight: f64,
    pub convenience_weight: f64,
}

impl Default for PriorityAnalysisSettings {
    fn default() -> Self {
        Self {
            budget_weight: 0.8,
            timeline_weight: 0.9,
            quality_weight: 0.7,
            convenience_weight: 0.6,
        }
    }
}

impl Default for ContextAnalysisSettings {
    fn default() -> Self {
        Self {
            priority_analysis: PriorityAnalysisSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub query_min_length: usize,
    pub query_max_length: usize,
    pub string_max_length: usize,
    pub personalization_max_gaps: usize,
    pub personalization_max_profile_entries: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            query_min_length: 1,
            query_max_length: 2000,
            string_max_length: 10_000,
            personalization_max_gaps: 50,
            personalization_max_profile_entries: 100,
        }
    }
}

impl Settings {
    /// Load layered settings: built-in defaults, then an optional JSON file,
    /// then `DRA_`-prefixed environment variables (`__` nesting, e.g.
    /// `DRA_AI__MAX_RETRIES=5`). Unknown keys are ignored. Numeric ranges are
    /// validated after extraction; `research.stage_count != 6` is rejected
    /// since the pipeline always runs exactly six fixed stages.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        if let Some(path) = file {
            if path.exists() {
                figment = figment.merge(Json::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("DRA_").split("__"));

        let settings: Settings = figment.extract().map_err(|e| ConfigError::Invalid {
            field: "<settings>".into(),
            reason: e.to_string(),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.research.stage_count != 6 {
            return Err(ConfigError::UnsupportedStageCount {
                value: self.research.stage_count,
            });
        }
        validate_unit_interval("research.min_confidence_fallback", self.research.min_confidence_fallback)?;
        validate_unit_interval(
            "ai_question_generation.relevance_threshold",
            self.ai_question_generation.relevance_threshold,
        )?;
        validate_unit_interval(
            "ai_question_generation.duplicate_detection",
            self.ai_question_generation.duplicate_detection,
        )?;
        for (name, weight) in [
            ("context_analysis.priority_analysis.budget_weight", self.context_analysis.priority_analysis.budget_weight),
            ("context_analysis.priority_analysis.timeline_weight", self.context_analysis.priority_analysis.timeline_weight),
            ("context_analysis.priority_analysis.quality_weight", self.context_analysis.priority_analysis.quality_weight),
            ("context_analysis.priority_analysis.convenience_weight", self.context_analysis.priority_analysis.convenience_weight),
        ] {
            validate_unit_interval(name, weight)?;
        }
        for (name, mode) in [
            ("quick", &self.dynamic_personalization.conversation_modes.quick),
            ("standard", &self.dynamic_personalization.conversation_modes.standard),
            ("deep", &self.dynamic_personalization.conversation_modes.deep),
            ("adaptive", &self.dynamic_personalization.conversation_modes.adaptive),
        ] {
            if mode.min_questions > mode.max_questions {
                return Err(ConfigError::Invalid {
                    field: format!("dynamic_personalization.conversation_modes.{name}"),
                    reason: "min_questions exceeds max_questions".into(),
                });
            }
            validate_unit_interval(
                &format!("dynamic_personalization.conversation_modes.{name}.time_sensitivity_threshold"),
                mode.time_sensitivity_threshold,
            )?;
        }
        if self.validation.query_min_length > self.validation.query_max_length {
            return Err(ConfigError::Invalid {
                field: "validation.query_min_length".into(),
                reason: "exceeds validation.query_max_length".into(),
            });
        }
        Ok(())
    }
}

fn validate_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field: field.into(),
            reason: format!("{value} is outside [0.0, 1.0]"),
        });
    }
    Ok(())
}

impl ConversationModeSettings {
    pub fn for_mode(&self, mode: crate::conversation::mode::ConversationMode) -> ModeSettings {
        use crate::conversation::mode::ConversationMode;
        match mode {
            ConversationMode::Quick => self.quick,
            ConversationMode::Standard => self.standard,
            ConversationMode::Deep => self.deep,
            ConversationMode::Adaptive => self.adaptive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::load(None).is_ok());
    }

    #[test]
    fn test_rejects_stage_count_not_six() {
        let mut settings = Settings::default();
        settings.research.stage_count = 5;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::UnsupportedStageCount { value: 5 })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let mut settings = Settings::default();
        settings.context_analysis.priority_analysis.budget_weight = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_min_exceeding_max_questions() {
        let mut settings = Settings::default();
        settings.dynamic_personalization.conversation_modes.quick.min_questions = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        // SAFETY: test runs single-threaded w.r.t. this env var; no other test touches it.
        unsafe {
            std::env::set_var("DRA_AI__MAX_RETRIES", "7");
        }
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.ai.max_retries, 7);
        unsafe {
            std::env::remove_var("DRA_AI__MAX_RETRIES");
        }
    }
}
