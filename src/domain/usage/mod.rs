//! Cost metering for the paid LLM dependency

mod cost_tracker;

pub use cost_tracker::{Clock, CostLimits, CostRates, CostTracker, SystemClock};
