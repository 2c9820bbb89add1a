//! Case index collaborator contract
//!
//! The case index embeds free text and answers nearest-neighbor queries over
//! historical fraud cases. The detection pipeline treats `embed`/`search`
//! failures as fatal; `upsert` serves ingestion flows outside the detection
//! path.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A single nearest-neighbor match from the case index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Case identifier in the index
    pub id: String,
    /// Cosine-like similarity (0.0 - 1.0)
    pub score: f32,
    /// Opaque case metadata, used downstream for category / status inference
    #[serde(default)]
    pub payload: HashMap<String, serde_json::Value>,
}

impl SearchResult {
    /// Create a new search result
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            payload: HashMap::new(),
        }
    }

    /// Add a payload entry
    pub fn with_payload(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Payload value as a string, if present and textual
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// Embedding + nearest-neighbor search over historical fraud cases
#[async_trait]
pub trait CaseIndex: Send + Sync + Debug {
    /// Embed text into the index's vector space
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Fetch the `top_k` most similar cases, ordered by descending similarity
    async fn search(&self, vector: &[f32], top_k: usize)
        -> Result<Vec<SearchResult>, DomainError>;

    /// Register or replace a case vector with its payload
    async fn upsert(
        &self,
        id: &str,
        vector: &[f32],
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock case index for testing
    #[derive(Debug, Default)]
    pub struct MockCaseIndex {
        results: Vec<SearchResult>,
        embed_error: Option<String>,
        search_error: Option<String>,
        embed_count: AtomicUsize,
        search_count: AtomicUsize,
        upserted: Mutex<Vec<String>>,
    }

    impl MockCaseIndex {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fixed results returned by every search
        pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
            self.results = results;
            self
        }

        pub fn with_embed_error(mut self, error: impl Into<String>) -> Self {
            self.embed_error = Some(error.into());
            self
        }

        pub fn with_search_error(mut self, error: impl Into<String>) -> Self {
            self.search_error = Some(error.into());
            self
        }

        pub fn embed_count(&self) -> usize {
            self.embed_count.load(Ordering::SeqCst)
        }

        pub fn search_count(&self) -> usize {
            self.search_count.load(Ordering::SeqCst)
        }

        /// IDs passed to `upsert`, in order
        pub fn upserted_ids(&self) -> Vec<String> {
            self.upserted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CaseIndex for MockCaseIndex {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, DomainError> {
            self.embed_count.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.embed_error {
                return Err(DomainError::case_index(error));
            }

            Ok(vec![0.1, 0.2, 0.3])
        }

        async fn search(
            &self,
            _vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<SearchResult>, DomainError> {
            self.search_count.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.search_error {
                return Err(DomainError::case_index(error));
            }

            Ok(self.results.iter().take(top_k).cloned().collect())
        }

        async fn upsert(
            &self,
            id: &str,
            _vector: &[f32],
            _payload: HashMap<String, serde_json::Value>,
        ) -> Result<(), DomainError> {
            self.upserted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_index_returns_fixed_results() {
            let index = MockCaseIndex::new().with_results(vec![
                SearchResult::new("case-1", 0.9),
                SearchResult::new("case-2", 0.6),
            ]);

            let vector = index.embed("사기 문자").await.unwrap();
            let results = index.search(&vector, 1).await.unwrap();

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].id, "case-1");
            assert_eq!(index.embed_count(), 1);
            assert_eq!(index.search_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_index_search_failure() {
            let index = MockCaseIndex::new().with_search_error("connection refused");

            let result = index.search(&[0.1], 5).await;
            assert!(result.is_err());
        }
    }
}
