//! Detection service boundary
//!
//! Thin layer over the workflow: runs one pipeline execution per request,
//! persists the history record, feeds confident matches back into the case
//! index and shapes the outward result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    ActionType, CaseCategory, CaseIndex, DetectionHistory, DetectionPeriod, DetectionStatus,
    DomainError, HistoryRepository, QualityGrade, RiskLevel, WorkflowState, WorkflowStatus,
};
use crate::infrastructure::workflow::DetectionWorkflow;

/// Matches at or above this similarity are fed back into the case index
const REREGISTER_THRESHOLD: f32 = 0.8;

/// Outward-facing result of one detection request
#[derive(Debug, Clone, serde::Serialize)]
pub struct DetectionOutcome {
    /// History record ID, when one was persisted
    pub detection_id: Option<Uuid>,
    pub status: DetectionStatus,
    pub action_type: ActionType,
    pub estimated_risk: Option<RiskLevel>,
    pub quality_score: Option<f64>,
    pub quality_grade: Option<QualityGrade>,
    pub next_action: Option<String>,
    pub improvement_suggestions: Vec<String>,
    pub should_share_community: bool,
    pub community_categories: Vec<CaseCategory>,
    pub community_share_title: Option<String>,
    pub community_share_message: Option<String>,
    pub matched_case_id: Option<String>,
    pub top_score: f32,
    pub llm_used: bool,
}

/// Runs detections and owns the history read/write paths
pub struct DetectionService {
    workflow: DetectionWorkflow,
    history: Arc<dyn HistoryRepository>,
    case_index: Arc<dyn CaseIndex>,
}

impl DetectionService {
    pub fn new(
        workflow: DetectionWorkflow,
        history: Arc<dyn HistoryRepository>,
        case_index: Arc<dyn CaseIndex>,
    ) -> Self {
        Self {
            workflow,
            history,
            case_index,
        }
    }

    /// Analyze one reported case for the given user
    pub async fn detect(
        &self,
        user_id: u64,
        input_text: &str,
    ) -> Result<DetectionOutcome, DomainError> {
        let state = self.workflow.execute(input_text).await;

        let action_type = state
            .action_type
            .unwrap_or(if state.status == WorkflowStatus::Failed {
                ActionType::WorkflowFailure
            } else {
                ActionType::NoAction
            });

        // Input rejections are not real analysis attempts and leave no trace
        let detection_id = if action_type.is_input_rejection() {
            None
        } else {
            Some(self.persist(user_id, &state).await?)
        };

        if state.status == WorkflowStatus::Completed {
            self.reregister_confident_match(user_id, &state).await;
        }

        Ok(Self::shape_outcome(detection_id, action_type, state))
    }

    /// History entries for a user within the given period, newest first
    pub async fn history(
        &self,
        user_id: u64,
        period: DetectionPeriod,
    ) -> Result<Vec<DetectionHistory>, DomainError> {
        self.history
            .find_by_user_since(user_id, period.start_date(Utc::now()))
            .await
    }

    /// One history entry; only its owner may read it
    pub async fn history_detail(
        &self,
        user_id: u64,
        detection_id: Uuid,
    ) -> Result<DetectionHistory, DomainError> {
        let record = self
            .history
            .find_by_id(detection_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("detection {detection_id}")))?;

        if record.user_id != user_id {
            return Err(DomainError::access_denied(
                "detection history belongs to another user",
            ));
        }

        Ok(record)
    }

    async fn persist(&self, user_id: u64, state: &WorkflowState) -> Result<Uuid, DomainError> {
        // Fatal failures persist a minimal record; completed runs the full one
        let status = state.detection_status.unwrap_or(DetectionStatus::Unknown);

        let mut record = DetectionHistory::new(user_id, state.original_input.clone(), status)
            .with_top_score(state.top_similarity_score);

        if let Some(top) = state.search_results.first() {
            record = record.with_matched_case_id(top.id.clone());
        }

        let saved = self.history.save(record).await?;
        Ok(saved.id)
    }

    /// A confidently matched input is itself useful evidence: register it
    /// back into the index, marked as user-analyzed. Best effort only.
    async fn reregister_confident_match(&self, user_id: u64, state: &WorkflowState) {
        let Some(top) = state.search_results.first() else {
            return;
        };

        if state.top_similarity_score < REREGISTER_THRESHOLD {
            return;
        }

        let vector = match self.case_index.embed(&state.current_input).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("re-registration embed failed: {e}");
                return;
            }
        };

        let mut payload: HashMap<String, serde_json::Value> = HashMap::new();
        payload.insert(
            "SBJECT".to_string(),
            serde_json::json!(state.original_input),
        );
        if let Some(keywords) = top.payload.get("AUTO_EXTRC_KWRD") {
            payload.insert("AUTO_EXTRC_KWRD".to_string(), keywords.clone());
        }
        payload.insert("source".to_string(), serde_json::json!("user-analyzed"));
        payload.insert("userId".to_string(), serde_json::json!(user_id));

        let id = Uuid::new_v4().to_string();
        if let Err(e) = self.case_index.upsert(&id, &vector, payload).await {
            warn!("re-registration upsert failed: {e}");
        }
    }

    fn shape_outcome(
        detection_id: Option<Uuid>,
        action_type: ActionType,
        state: WorkflowState,
    ) -> DetectionOutcome {
        DetectionOutcome {
            detection_id,
            status: state.detection_status.unwrap_or(DetectionStatus::Unknown),
            action_type,
            estimated_risk: state.estimated_risk,
            quality_score: state.quality_assessment.as_ref().map(|q| q.overall_score),
            quality_grade: state.quality_assessment.as_ref().map(|q| q.grade),
            next_action: state.next_action,
            improvement_suggestions: state.improvement_suggestions,
            should_share_community: state.should_share_community,
            community_categories: state.community_categories,
            community_share_title: state.community_share_title,
            community_share_message: state.community_share_message,
            matched_case_id: state.search_results.first().map(|r| r.id.clone()),
            top_score: state.top_similarity_score,
            llm_used: state.llm_used,
        }
    }
}
