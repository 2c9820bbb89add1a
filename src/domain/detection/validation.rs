//! Semantic validation result types

use serde::{Deserialize, Serialize};

/// How the semantic validator classified the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    /// A valid fraud case description
    ValidCase,
    /// Clearly unrelated to fraud (greetings, math homework, ...)
    InvalidCase,
    /// Too vague; the user should add context
    NeedsClarification,
    /// The LLM was unreachable or its answer unusable
    LlmError,
}

impl ValidationType {
    /// Decode a classification token from LLM output. Closed mapping table;
    /// anything unrecognized is treated as an LLM error.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_uppercase().as_str() {
            "VALID_CASE" => Self::ValidCase,
            "INVALID_CASE" => Self::InvalidCase,
            "NEEDS_CLARIFICATION" => Self::NeedsClarification,
            _ => Self::LlmError,
        }
    }
}

/// Immutable result of one input validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: String,
    pub suggestion: String,
    pub validation_type: ValidationType,
    /// Classifier confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl ValidationResult {
    /// Build a result; `is_valid` is derived from the classification
    pub fn new(
        validation_type: ValidationType,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            is_valid: validation_type == ValidationType::ValidCase,
            reason: reason.into(),
            suggestion: suggestion.into(),
            validation_type,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Fallback result when the LLM could not be used at all
    pub fn llm_error(reason: impl Into<String>) -> Self {
        Self::new(
            ValidationType::LlmError,
            reason,
            "일시적 오류입니다. 잠시 후 다시 시도해주세요",
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_decoding() {
        assert_eq!(ValidationType::from_token("VALID_CASE"), ValidationType::ValidCase);
        assert_eq!(ValidationType::from_token("invalid_case"), ValidationType::InvalidCase);
        assert_eq!(
            ValidationType::from_token("  Needs_Clarification "),
            ValidationType::NeedsClarification
        );
        assert_eq!(ValidationType::from_token("MAYBE"), ValidationType::LlmError);
        assert_eq!(ValidationType::from_token(""), ValidationType::LlmError);
    }

    #[test]
    fn test_validity_follows_classification() {
        let valid = ValidationResult::new(ValidationType::ValidCase, "fraud terms present", "", 0.9);
        assert!(valid.is_valid);

        let invalid = ValidationResult::new(ValidationType::InvalidCase, "greeting", "", 0.8);
        assert!(!invalid.is_valid);
    }

    #[test]
    fn test_llm_error_has_zero_confidence() {
        let result = ValidationResult::llm_error("connection reset");

        assert_eq!(result.validation_type, ValidationType::LlmError);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let result = ValidationResult::new(ValidationType::ValidCase, "r", "s", 1.7);
        assert_eq!(result.confidence, 1.0);
    }
}
