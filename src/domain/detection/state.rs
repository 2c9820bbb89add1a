//! Workflow state threading through one detection request
//!
//! One instance per request, exclusively owned by the orchestrator for the
//! request's lifetime. Every failure mode ends up encoded here rather than in
//! a returned error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quality::QualityAssessment;
use super::validation::ValidationResult;
use crate::domain::case_index::SearchResult;
use crate::domain::lexicon::CaseCategory;

/// Overall workflow status; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initialized,
    InputValidating,
    InputImproving,
    Searching,
    QualityAssessing,
    DecisionMaking,
    Completed,
    Failed,
    NeedsHumanIntervention,
}

impl WorkflowStatus {
    /// Terminal states end the pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::InputValidating => "input_validating",
            Self::InputImproving => "input_improving",
            Self::Searching => "searching",
            Self::QualityAssessing => "quality_assessing",
            Self::DecisionMaking => "decision_making",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NeedsHumanIntervention => "needs_human_intervention",
        };
        write!(f, "{s}")
    }
}

/// Pipeline step currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    BasicValidation,
    LlmValidation,
    QueryImprovement,
    VectorSearch,
    QualityEvaluation,
    ResultAnalysis,
    FinalDecision,
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BasicValidation => "basic_validation",
            Self::LlmValidation => "llm_validation",
            Self::QueryImprovement => "query_improvement",
            Self::VectorSearch => "vector_search",
            Self::QualityEvaluation => "quality_evaluation",
            Self::ResultAnalysis => "result_analysis",
            Self::FinalDecision => "final_decision",
        };
        write!(f, "{s}")
    }
}

/// Why the final decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    HighQualityResults,
    MediumQualityResults,
    LowQualityResults,
    HighSimilarity,
    NoResults,
    InputTooVague,
    CostLimitReached,
    LlmFailure,
    ManualInterventionNeeded,
    CommunityShareSuggested,
    MixedSignals,
    LowRiskPattern,
}

/// Verdict of the detection pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectionStatus {
    Safe,
    Warning,
    Danger,
    /// No verdict possible (unrelated input, no comparable cases)
    Unknown,
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Danger => "DANGER",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Estimated risk of the described interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// The more severe of two estimates
    pub fn max(self, other: Self) -> Self {
        std::cmp::Ord::max(self, other)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

/// Outcome / failure classifier consumed by the caller for UI mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Immediate action advised (danger verdict)
    ImmediateAction,
    /// Share the case with the community
    CommunityShare,
    /// Manual review advised
    ManualReview,
    /// Keep monitoring
    Monitoring,
    /// Nothing to do
    NoAction,

    // Failure / rejection classifiers, kept for tracking
    WorkflowFailure,
    SystemError,
    LlmFailure,
    SearchFailure,
    TimeoutError,
    InputValidationFailure,
    QualityAssessmentFailure,
    /// Input unrelated to fraud
    InvalidInputCase,
    /// Input too vague to analyze
    AmbiguousInput,
}

impl ActionType {
    /// Input rejections are terminal for the request but are not real
    /// analysis attempts; the service layer skips persisting them.
    pub fn is_input_rejection(&self) -> bool {
        matches!(self, Self::InvalidInputCase | Self::AmbiguousInput)
    }
}

/// Mutable state of one detection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    // Identity / text
    pub original_input: String,
    pub current_input: String,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,

    // Control
    pub status: WorkflowStatus,
    pub current_step: WorkflowStep,
    pub attempt_count: u32,
    pub max_attempts: u32,

    // Validation
    pub input_validation: Option<ValidationResult>,
    pub improvement_suggestions: Vec<String>,

    // Evidence
    pub search_results: Vec<SearchResult>,
    pub top_similarity_score: f32,
    pub result_count: usize,
    pub quality_assessment: Option<QualityAssessment>,

    // LLM usage
    pub llm_used: bool,
    pub llm_call_count: u32,
    pub estimated_cost: f64,
    pub llm_confidence: f64,

    // Audit
    pub workflow_log: Vec<String>,
    pub last_error: Option<String>,

    // Outcome
    pub decision_reason: Option<DecisionReason>,
    pub next_action: Option<String>,
    pub detection_status: Option<DetectionStatus>,
    pub estimated_risk: Option<RiskLevel>,
    pub should_share_community: bool,
    pub community_categories: Vec<CaseCategory>,
    pub community_share_title: Option<String>,
    pub community_share_message: Option<String>,
    pub action_type: Option<ActionType>,
}

impl WorkflowState {
    /// Initial state for a fresh request
    pub fn initialize(input: impl Into<String>, max_attempts: u32) -> Self {
        let input = input.into();
        let now = Utc::now();

        Self {
            original_input: input.clone(),
            current_input: input,
            start_time: now,
            last_update_time: now,
            status: WorkflowStatus::Initialized,
            current_step: WorkflowStep::BasicValidation,
            attempt_count: 0,
            max_attempts,
            input_validation: None,
            improvement_suggestions: Vec::new(),
            search_results: Vec::new(),
            top_similarity_score: 0.0,
            result_count: 0,
            quality_assessment: None,
            llm_used: false,
            llm_call_count: 0,
            estimated_cost: 0.0,
            llm_confidence: 0.0,
            workflow_log: Vec::new(),
            last_error: None,
            decision_reason: None,
            next_action: None,
            detection_status: None,
            estimated_risk: None,
            should_share_community: false,
            community_categories: Vec::new(),
            community_share_title: None,
            community_share_message: None,
            action_type: None,
        }
    }

    /// Append a timestamped entry to the audit log
    pub fn add_log(&mut self, message: impl AsRef<str>) {
        self.workflow_log
            .push(format!("[{}] {}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"), message.as_ref()));
    }

    /// Move to the given step, logging the transition
    pub fn update_step(&mut self, step: WorkflowStep) -> &mut Self {
        self.current_step = step;
        self.last_update_time = Utc::now();
        self.add_log(format!("step -> {step}"));
        self
    }

    /// Move to the given status, logging the transition
    pub fn update_status(&mut self, status: WorkflowStatus) -> &mut Self {
        self.status = status;
        self.last_update_time = Utc::now();
        self.add_log(format!("status -> {status}"));
        self
    }

    /// Gate for the LLM steps: the LLM runs at most once per request and only
    /// while the attempt counter is below the retry ceiling.
    pub fn should_use_llm(&self) -> bool {
        !self.llm_used && self.attempt_count < 2
    }

    /// Whether another attempt would still be within bounds
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Book one admitted LLM call against this request
    pub fn record_llm_call(&mut self, cost: f64) {
        self.llm_used = true;
        self.llm_call_count += 1;
        self.estimated_cost += cost;
    }

    /// Mark the workflow failed with an error and outcome classifier
    pub fn fail(&mut self, error: impl Into<String>, action_type: ActionType) {
        let error = error.into();
        self.update_status(WorkflowStatus::Failed);
        self.last_error = Some(error.clone());
        self.action_type = Some(action_type);
        self.add_log(format!("workflow failed: {error}"));
    }
}
