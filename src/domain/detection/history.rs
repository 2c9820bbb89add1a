//! Detection history persistence boundary

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::state::DetectionStatus;
use crate::domain::DomainError;

/// Time window for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPeriod {
    Week,
    Month,
    ThreeMonths,
    All,
}

impl DetectionPeriod {
    /// Start of the window, relative to now
    pub fn start_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Week => now - Duration::days(7),
            Self::Month => now - Duration::days(30),
            Self::ThreeMonths => now - Duration::days(90),
            Self::All => DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// One persisted detection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionHistory {
    pub id: Uuid,
    pub user_id: u64,
    pub input_text: String,
    pub top_score: f32,
    pub status: DetectionStatus,
    /// Index ID of the best match, when any
    pub matched_case_id: Option<String>,
    pub detection_type: String,
    pub detected_at: DateTime<Utc>,
}

impl DetectionHistory {
    /// Create a new record stamped with the current time
    pub fn new(user_id: u64, input_text: impl Into<String>, status: DetectionStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            input_text: input_text.into(),
            top_score: 0.0,
            status,
            matched_case_id: None,
            detection_type: "CASE".to_string(),
            detected_at: Utc::now(),
        }
    }

    pub fn with_top_score(mut self, score: f32) -> Self {
        self.top_score = score;
        self
    }

    pub fn with_matched_case_id(mut self, id: impl Into<String>) -> Self {
        self.matched_case_id = Some(id.into());
        self
    }

    pub fn with_detection_type(mut self, detection_type: impl Into<String>) -> Self {
        self.detection_type = detection_type.into();
        self
    }
}

/// Repository for detection history records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Persist one record
    async fn save(&self, record: DetectionHistory) -> Result<DetectionHistory, DomainError>;

    /// Find a record by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DetectionHistory>, DomainError>;

    /// Records for a user since the given time, newest first
    async fn find_by_user_since(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<DetectionHistory>, DomainError>;
}
