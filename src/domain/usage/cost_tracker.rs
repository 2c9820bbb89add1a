//! LLM call metering and admission control
//!
//! Process-wide bookkeeping for a paid external dependency. Day-keyed
//! counters shared by every concurrent request; a best-effort budget guarding
//! against runaway spend, not a billing-grade ledger.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Calendar source, injectable so tests control the day boundary
pub trait Clock: Send + Sync + Debug {
    /// Today's date
    fn today(&self) -> NaiveDate;
}

/// Wall-clock calendar
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Per-token pricing (USD per million tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRates {
    #[serde(default = "default_input_rate")]
    pub input_per_million: f64,
    #[serde(default = "default_output_rate")]
    pub output_per_million: f64,
}

fn default_input_rate() -> f64 {
    0.05
}

fn default_output_rate() -> f64 {
    0.40
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            input_per_million: default_input_rate(),
            output_per_million: default_output_rate(),
        }
    }
}

/// Budget limits for the admission check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLimits {
    /// Daily spend ceiling in USD
    #[serde(default = "default_daily_cost_limit")]
    pub daily_cost_limit: f64,
    /// Daily call ceiling
    #[serde(default = "default_daily_call_limit")]
    pub daily_call_limit: u32,
    /// Single-call cost ceiling in USD
    #[serde(default = "default_per_call_cost_limit")]
    pub per_call_cost_limit: f64,
}

fn default_daily_cost_limit() -> f64 {
    0.01
}

fn default_daily_call_limit() -> u32 {
    100
}

fn default_per_call_cost_limit() -> f64 {
    0.001
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            daily_cost_limit: default_daily_cost_limit(),
            daily_call_limit: default_daily_call_limit(),
            per_call_cost_limit: default_per_call_cost_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DayUsage {
    calls: u32,
    cost: f64,
}

/// Day-keyed ledger entries older than this are evicted on every write
const RETENTION_DAYS: i64 = 7;

/// Meters LLM calls against daily and per-call budgets
#[derive(Debug)]
pub struct CostTracker {
    rates: CostRates,
    limits: CostLimits,
    clock: Box<dyn Clock>,
    ledger: Mutex<HashMap<NaiveDate, DayUsage>>,
}

impl CostTracker {
    pub fn new(rates: CostRates, limits: CostLimits) -> Self {
        Self::with_clock(rates, limits, Box::new(SystemClock))
    }

    /// Build a tracker with an explicit calendar (tests pin the day)
    pub fn with_clock(rates: CostRates, limits: CostLimits, clock: Box<dyn Clock>) -> Self {
        Self {
            rates,
            limits,
            clock,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &CostLimits {
        &self.limits
    }

    /// Rough token count: Hangul runs ~2 characters per token, ASCII letters
    /// ~4, everything else ~3.
    pub fn estimate_tokens(text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let mut hangul = 0u32;
        let mut ascii_letters = 0u32;
        let mut other = 0u32;

        for c in text.chars() {
            if is_hangul(c) {
                hangul += 1;
            } else if c.is_ascii_alphabetic() {
                ascii_letters += 1;
            } else {
                other += 1;
            }
        }

        hangul / 2 + ascii_letters / 4 + other / 3 + 1
    }

    /// Cost of a call with the given token counts
    pub fn cost_for(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) / 1_000_000.0) * self.rates.input_per_million
            + (f64::from(output_tokens) / 1_000_000.0) * self.rates.output_per_million
    }

    /// Estimated cost of sending `input_text` and receiving up to
    /// `expected_output_tokens` back
    pub fn estimate_cost(&self, input_text: &str, expected_output_tokens: u32) -> f64 {
        self.cost_for(Self::estimate_tokens(input_text), expected_output_tokens)
    }

    /// Typical cost of one semantic validation call
    pub fn validation_call_cost(&self) -> f64 {
        self.cost_for(250, 120).min(self.limits.per_call_cost_limit)
    }

    /// Typical cost of one query-improvement call
    pub fn query_improvement_cost(&self) -> f64 {
        self.cost_for(210, 80).min(self.limits.per_call_cost_limit)
    }

    /// Admission check: daily cost, daily call count and per-call cost must
    /// all be within budget.
    ///
    /// Deliberate tradeoff: an internal bookkeeping error fails open and
    /// admits the call, so a ledger bug can never block the detection
    /// pipeline.
    pub fn can_make_call(&self, estimated_cost: f64) -> bool {
        let guard = match self.ledger.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("cost ledger unavailable ({e}), admitting call");
                return true;
            }
        };

        let today = self.clock.today();
        let usage = guard.get(&today).copied().unwrap_or_default();

        let cost_ok = usage.cost + estimated_cost <= self.limits.daily_cost_limit;
        let calls_ok = usage.calls < self.limits.daily_call_limit;
        let per_call_ok = estimated_cost <= self.limits.per_call_cost_limit;

        if !cost_ok {
            debug!(
                daily_cost = usage.cost,
                limit = self.limits.daily_cost_limit,
                "daily cost limit reached"
            );
        }
        if !calls_ok {
            debug!(
                daily_calls = usage.calls,
                limit = self.limits.daily_call_limit,
                "daily call limit reached"
            );
        }
        if !per_call_ok {
            debug!(
                estimated_cost,
                limit = self.limits.per_call_cost_limit,
                "single call over per-call limit"
            );
        }

        cost_ok && calls_ok && per_call_ok
    }

    /// Book one call against today's counters, evicting stale days
    pub fn record_call(&self, cost: f64) {
        let Ok(mut guard) = self.ledger.lock() else {
            warn!("cost ledger unavailable, call not recorded");
            return;
        };

        let today = self.clock.today();
        let usage = guard.entry(today).or_default();
        usage.calls += 1;
        usage.cost += cost;

        let cutoff = today - Duration::days(RETENTION_DAYS);
        guard.retain(|day, _| *day >= cutoff);
    }

    /// Accumulated cost for today
    pub fn daily_cost(&self) -> f64 {
        let today = self.clock.today();
        self.ledger
            .lock()
            .map(|g| g.get(&today).map(|u| u.cost).unwrap_or(0.0))
            .unwrap_or(0.0)
    }

    /// Calls made today
    pub fn daily_call_count(&self) -> u32 {
        let today = self.clock.today();
        self.ledger
            .lock()
            .map(|g| g.get(&today).map(|u| u.calls).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of days currently tracked (for eviction tests)
    #[cfg(test)]
    fn tracked_days(&self) -> usize {
        self.ledger.lock().map(|g| g.len()).unwrap_or(0)
    }
}

fn is_hangul(c: char) -> bool {
    matches!(
        c,
        '\u{1100}'..='\u{11FF}'      // Hangul Jamo
        | '\u{3130}'..='\u{318F}'    // Compatibility Jamo
        | '\u{A960}'..='\u{A97F}'    // Jamo Extended-A
        | '\u{AC00}'..='\u{D7A3}'    // Syllables
        | '\u{D7B0}'..='\u{D7FF}'    // Jamo Extended-B
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Test calendar with a movable day
    #[derive(Debug)]
    struct FixedClock(Mutex<NaiveDate>);

    impl FixedClock {
        fn at(date: NaiveDate) -> Self {
            Self(Mutex::new(date))
        }

        fn advance_days(&self, days: i64) {
            let mut guard = self.0.lock().unwrap();
            *guard += Duration::days(days);
        }
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            *self.0.lock().unwrap()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker() -> CostTracker {
        CostTracker::with_clock(
            CostRates::default(),
            CostLimits::default(),
            Box::new(FixedClock::at(day(2025, 3, 10))),
        )
    }

    #[test]
    fn test_token_estimation_by_character_class() {
        // 10 Hangul syllables -> 5, +1
        assert_eq!(CostTracker::estimate_tokens("피싱사기의심문자경고"), 6);
        // 8 ASCII letters -> 2, +1
        assert_eq!(CostTracker::estimate_tokens("phishing"), 3);
        assert_eq!(CostTracker::estimate_tokens(""), 0);
        // digits/punctuation fall into the "other" class
        assert_eq!(CostTracker::estimate_tokens("123456"), 3);
    }

    #[test]
    fn test_cost_formula() {
        let tracker = tracker();

        let cost = tracker.cost_for(1_000_000, 1_000_000);
        assert!((cost - 0.45).abs() < 1e-12);

        let estimate = tracker.estimate_cost("phishing", 120);
        let expected = (3.0 / 1e6) * 0.05 + (120.0 / 1e6) * 0.40;
        assert!((estimate - expected).abs() < 1e-12);
    }

    #[test]
    fn test_daily_cost_accumulates() {
        let tracker = tracker();
        let cost = 0.0005;

        for _ in 0..4 {
            tracker.record_call(cost);
        }

        assert!((tracker.daily_cost() - 4.0 * cost).abs() < 1e-12);
        assert_eq!(tracker.daily_call_count(), 4);
    }

    #[test]
    fn test_admission_denied_over_daily_cost_limit() {
        let tracker = tracker();

        // Default daily limit is $0.01
        assert!(tracker.can_make_call(0.0009));
        for _ in 0..12 {
            tracker.record_call(0.0009);
        }

        assert!(!tracker.can_make_call(0.0009));
    }

    #[test]
    fn test_admission_denied_over_call_limit() {
        let tracker = CostTracker::with_clock(
            CostRates::default(),
            CostLimits {
                daily_cost_limit: 100.0,
                daily_call_limit: 2,
                per_call_cost_limit: 1.0,
            },
            Box::new(FixedClock::at(day(2025, 3, 10))),
        );

        assert!(tracker.can_make_call(0.001));
        tracker.record_call(0.001);
        assert!(tracker.can_make_call(0.001));
        tracker.record_call(0.001);

        assert!(!tracker.can_make_call(0.001));
    }

    #[test]
    fn test_admission_denied_over_per_call_limit() {
        let tracker = tracker();

        // Default per-call limit is $0.001
        assert!(tracker.can_make_call(0.001));
        assert!(!tracker.can_make_call(0.002));
    }

    #[test]
    fn test_counters_reset_at_day_boundary() {
        let shared = std::sync::Arc::new(FixedClock::at(day(2025, 3, 10)));
        let tracker = CostTracker::with_clock(
            CostRates::default(),
            CostLimits::default(),
            Box::new(SharedClock(shared.clone())),
        );

        tracker.record_call(0.0009);
        assert_eq!(tracker.daily_call_count(), 1);

        // A new day starts with fresh counters; yesterday's entry stays in
        // the ledger until eviction
        shared.advance_days(1);
        assert_eq!(tracker.daily_call_count(), 0);
        assert!((tracker.daily_cost()).abs() < 1e-12);
        assert!(tracker.can_make_call(0.0009));
    }

    #[derive(Debug)]
    struct SharedClock(std::sync::Arc<FixedClock>);

    impl Clock for SharedClock {
        fn today(&self) -> NaiveDate {
            self.0.today()
        }
    }

    #[test]
    fn test_stale_days_evicted_on_write() {
        let shared = std::sync::Arc::new(FixedClock::at(day(2025, 3, 1)));
        let tracker = CostTracker::with_clock(
            CostRates::default(),
            CostLimits::default(),
            Box::new(SharedClock(shared.clone())),
        );

        tracker.record_call(0.0001);
        assert_eq!(tracker.tracked_days(), 1);

        shared.advance_days(3);
        tracker.record_call(0.0001);
        assert_eq!(tracker.tracked_days(), 2);

        // Ten days later the earlier entries fall outside retention
        shared.advance_days(10);
        tracker.record_call(0.0001);
        assert_eq!(tracker.tracked_days(), 1);
        assert_eq!(tracker.daily_call_count(), 1);
    }
}
