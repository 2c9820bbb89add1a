//! ScamLens - fraud case detection engine
//!
//! Analyzes a user-submitted description of a suspected fraud or phishing
//! interaction and returns a risk verdict (SAFE / WARNING / DANGER / UNKNOWN)
//! with an explanation of result quality. The core is a state-carrying
//! detection pipeline:
//! - rule-based input validation with an LLM-backed semantic escalation
//! - nearest-neighbor search over an embedding index of reported cases
//! - deterministic scoring of the retrieved evidence
//! - a final decision with risk estimate and community-share recommendation
//!
//! The LLM dependency is metered by an admission-control budget and every
//! external failure degrades gracefully: callers branch on the returned
//! state, never on errors.

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::{CaseIndex, CostTracker, FraudLexicon, LlmProvider, QualityScorer};
use infrastructure::case_index::HttpCaseIndex;
use infrastructure::history::InMemoryHistoryRepository;
use infrastructure::llm::{HttpClient, OpenAiProvider};
use infrastructure::services::DetectionService;
use infrastructure::validation::SemanticValidator;
use infrastructure::workflow::DetectionWorkflow;

/// Default timeout for calls to the LLM and case-index services
const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire a detection service from configuration.
///
/// The LLM credential comes from `OPENAI_API_KEY`; index endpoints come from
/// the configuration. History uses the in-memory reference store - swap in a
/// durable [`domain::HistoryRepository`] via [`DetectionService::new`] for
/// production persistence.
pub fn build_detection_service(config: &AppConfig) -> anyhow::Result<DetectionService> {
    let detection = &config.detection;

    // Pick up a local .env if present; real environments set variables directly
    let _ = dotenvy::dotenv();

    let api_key =
        std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "sk-placeholder".to_string());
    let llm_provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        HttpClient::with_timeout(EXTERNAL_CALL_TIMEOUT),
        api_key,
    ));

    let case_index: Arc<dyn CaseIndex> = Arc::new(HttpCaseIndex::new(
        HttpClient::with_timeout(EXTERNAL_CALL_TIMEOUT),
        &detection.index,
    ));

    let lexicon = FraudLexicon::default();
    let scorer = QualityScorer::new(detection.quality.clone(), lexicon);
    let validator =
        SemanticValidator::new(llm_provider, detection.llm.clone(), scorer.clone());
    let cost_tracker = Arc::new(CostTracker::new(
        detection.cost.rates.clone(),
        detection.cost.limits.clone(),
    ));

    let workflow = DetectionWorkflow::new(
        detection.clone(),
        case_index.clone(),
        scorer,
        validator,
        cost_tracker,
    );

    Ok(DetectionService::new(
        workflow,
        Arc::new(InMemoryHistoryRepository::new()),
        case_index,
    ))
}
