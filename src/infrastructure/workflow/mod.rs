//! Workflow orchestration

mod orchestrator;

pub use orchestrator::DetectionWorkflow;
