//! Domain layer - core entities, traits and pure logic

pub mod case_index;
pub mod detection;
pub mod error;
pub mod lexicon;
pub mod llm;
pub mod usage;

pub use case_index::{CaseIndex, SearchResult};
pub use detection::{
    ActionType, DecisionReason, DetectionHistory, DetectionPeriod, DetectionStatus,
    HistoryRepository, QualityAssessment, QualityConfig, QualityGrade, QualityScorer, RiskLevel,
    ValidationResult, ValidationType, WorkflowState, WorkflowStatus, WorkflowStep,
};
pub use error::DomainError;
pub use lexicon::{CaseCategory, FraudLexicon};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole};
pub use usage::{Clock, CostLimits, CostRates, CostTracker, SystemClock};
