use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{DetectionHistory, DomainError, HistoryRepository};

/// In-memory history store, the reference implementation of the persistence
/// boundary
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    records: RwLock<Vec<DetectionHistory>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn save(&self, record: DetectionHistory) -> Result<DetectionHistory, DomainError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DetectionHistory>, DomainError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_user_since(
        &self,
        user_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<DetectionHistory>, DomainError> {
        let records = self.records.read().await;
        let mut matches: Vec<DetectionHistory> = records
            .iter()
            .filter(|r| r.user_id == user_id && r.detected_at >= since)
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(matches)
    }
}
