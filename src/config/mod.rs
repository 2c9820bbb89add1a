//! Typed application configuration

mod app_config;

pub use app_config::{
    AppConfig, CaseIndexSettings, CostSettings, DetectionConfig, LlmSettings, LogFormat,
    LoggingConfig,
};
