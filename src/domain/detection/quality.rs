//! Quality assessment of retrieved evidence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality grade derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Unacceptable,
}

impl QualityGrade {
    /// Map a 0-10 score to its grade
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Excellent
        } else if score >= 7.0 {
            Self::Good
        } else if score >= 5.0 {
            Self::Acceptable
        } else if score >= 3.0 {
            Self::Poor
        } else {
            Self::Unacceptable
        }
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Poor => "poor",
            Self::Unacceptable => "unacceptable",
        };
        write!(f, "{s}")
    }
}

/// How trustworthy the retrieved evidence plus the input phrasing are
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Composite quality score (0.0 - 10.0)
    pub overall_score: f64,
    /// Grade derived from the score
    pub grade: QualityGrade,
    /// Why the score came out this way
    pub reason: String,
    /// What the user should do with the result
    pub suggestion: String,
    /// Similarity of the best match (0.0 - 1.0)
    pub top_similarity_score: f32,
    /// Number of retrieved cases
    pub result_count: usize,
    /// Whether the verdict can be applied without further verification
    pub is_acceptable: bool,
    /// Ordered suggestions for improving the input
    pub improvement_steps: Vec<String>,
    /// When the assessment was produced
    pub assessment_time: DateTime<Utc>,
}

impl QualityAssessment {
    /// Create an assessment; grade is derived from the score
    pub fn new(overall_score: f64, top_similarity_score: f32, result_count: usize) -> Self {
        let overall_score = overall_score.clamp(0.0, 10.0);

        Self {
            overall_score,
            grade: QualityGrade::from_score(overall_score),
            reason: String::new(),
            suggestion: String::new(),
            top_similarity_score,
            result_count,
            is_acceptable: false,
            improvement_steps: Vec::new(),
            assessment_time: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_acceptable(mut self, acceptable: bool) -> Self {
        self.is_acceptable = acceptable;
        self
    }

    pub fn with_improvement_steps(mut self, steps: Vec<String>) -> Self {
        self.improvement_steps = steps;
        self
    }

    /// Re-clamp the score to an upper bound, re-deriving the grade
    pub fn capped_at(mut self, max_score: f64) -> Self {
        if self.overall_score > max_score {
            self.overall_score = max_score;
            self.grade = QualityGrade::from_score(max_score);
        }
        self
    }
}
