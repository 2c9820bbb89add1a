//! Detection pipeline entities and pure logic

pub mod history;
pub mod quality;
pub mod scorer;
pub mod state;
pub mod validation;

pub use history::{DetectionHistory, DetectionPeriod, HistoryRepository};
#[cfg(test)]
pub use history::MockHistoryRepository;
pub use quality::{QualityAssessment, QualityGrade};
pub use scorer::{QualityConfig, QualityScorer};
pub use state::{
    ActionType, DecisionReason, DetectionStatus, RiskLevel, WorkflowState, WorkflowStatus,
    WorkflowStep,
};
pub use validation::{ValidationResult, ValidationType};
