use serde::Deserialize;

use crate::domain::{CostLimits, CostRates, QualityConfig};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Settings for the detection pipeline and its collaborators
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub cost: CostSettings,
    #[serde(default)]
    pub index: CaseIndexSettings,
    /// Retry ceiling carried in the workflow state
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Below this top similarity the verdict is UNKNOWN
    #[serde(default = "default_low_similarity_threshold")]
    pub low_similarity_threshold: f32,
    /// Below this quality score a rewritten query is worth trying
    #[serde(default = "default_low_quality_threshold")]
    pub low_quality_threshold: f64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_low_similarity_threshold() -> f32 {
    0.3
}

fn default_low_quality_threshold() -> f64 {
    5.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            quality: QualityConfig::default(),
            llm: LlmSettings::default(),
            cost: CostSettings::default(),
            index: CaseIndexSettings::default(),
            max_attempts: default_max_attempts(),
            low_similarity_threshold: default_low_similarity_threshold(),
            low_quality_threshold: default_low_quality_threshold(),
        }
    }
}

/// LLM collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// Master switch for the LLM steps
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            model: default_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Pricing and budget settings for the cost tracker
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CostSettings {
    #[serde(default)]
    pub rates: CostRates,
    #[serde(default)]
    pub limits: CostLimits,
}

/// Endpoints for the embedding + vector index services
#[derive(Debug, Clone, Deserialize)]
pub struct CaseIndexSettings {
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_embedding_url() -> String {
    "http://localhost:8000/embed".to_string()
}

fn default_index_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "fraud_cases".to_string()
}

fn default_top_k() -> usize {
    5
}

impl Default for CaseIndexSettings {
    fn default() -> Self {
        Self {
            embedding_url: default_embedding_url(),
            index_url: default_index_url(),
            collection: default_collection(),
            top_k: default_top_k(),
        }
    }
}

impl AppConfig {
    /// Load from `config/default`, `config/local` and `APP__`-prefixed
    /// environment variables, in that order of precedence.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
