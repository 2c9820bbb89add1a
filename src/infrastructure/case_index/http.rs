use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CaseIndexSettings;
use crate::domain::{CaseIndex, DomainError, SearchResult};
use crate::infrastructure::llm::HttpClientTrait;

/// Case index backed by an embedding API plus a Qdrant-style vector store
#[derive(Debug)]
pub struct HttpCaseIndex<C: HttpClientTrait> {
    client: C,
    embedding_url: String,
    index_url: String,
    collection: String,
}

impl<C: HttpClientTrait> HttpCaseIndex<C> {
    pub fn new(client: C, settings: &CaseIndexSettings) -> Self {
        Self {
            client,
            embedding_url: settings.embedding_url.clone(),
            index_url: settings.index_url.trim_end_matches('/').to_string(),
            collection: settings.collection.clone(),
        }
    }

    fn search_url(&self) -> String {
        format!(
            "{}/collections/{}/points/search",
            self.index_url, self.collection
        )
    }

    fn points_url(&self) -> String {
        format!("{}/collections/{}/points", self.index_url, self.collection)
    }

    fn headers() -> Vec<(&'static str, &'static str)> {
        vec![("Content-Type", "application/json")]
    }
}

#[async_trait]
impl<C: HttpClientTrait> CaseIndex for HttpCaseIndex<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let body = serde_json::json!({ "text": text });
        let json = self
            .client
            .post_json(&self.embedding_url, Self::headers(), &body)
            .await
            .map_err(|e| DomainError::case_index(format!("embedding call failed: {e}")))?;

        let response: EmbeddingResponse = serde_json::from_value(json)
            .map_err(|e| DomainError::case_index(format!("bad embedding response: {e}")))?;

        if response.vector.is_empty() {
            return Err(DomainError::case_index("embedding response had no vector"));
        }

        Ok(response.vector)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let body = serde_json::json!({
            "vector": vector,
            "top": top_k,
            "with_payload": true,
        });
        let json = self
            .client
            .post_json(&self.search_url(), Self::headers(), &body)
            .await
            .map_err(|e| DomainError::case_index(format!("search call failed: {e}")))?;

        let response: PointsSearchResponse = serde_json::from_value(json)
            .map_err(|e| DomainError::case_index(format!("bad search response: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| SearchResult {
                id: point.id.to_plain_string(),
                score: point.score,
                payload: point.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn upsert(
        &self,
        id: &str,
        vector: &[f32],
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<(), DomainError> {
        let body = serde_json::json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": payload,
            }]
        });

        self.client
            .put_json(&self.points_url(), Self::headers(), &body)
            .await
            .map_err(|e| DomainError::case_index(format!("upsert failed: {e}")))?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct PointsSearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    payload: Option<HashMap<String, serde_json::Value>>,
}

/// Point IDs come back as integers or UUID strings depending on how the case
/// was ingested
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Str(String),
}

impl PointId {
    fn to_plain_string(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}
