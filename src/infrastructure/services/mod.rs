//! Application services

mod detection_service;

pub use detection_service::{DetectionOutcome, DetectionService};
