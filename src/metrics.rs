//! Run accounting helpers.
//!
//! Lightweight counters and stage timings collected while a plan executes,
//! surfaced through the logger at the end of a run.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Aggregated counters for one extraction run.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunMetrics {
    /// Root (or item) elements matched by the plan.
    pub roots_matched: u64,
    /// Records appended to the result set.
    pub records_emitted: u64,
    /// Fields that fell back to their sentinel value.
    pub fields_defaulted: u64,
    /// Items dropped because a required field was absent.
    pub items_skipped: u64,
    pub navigate_ms: u64,
    pub extract_ms: u64,
}

impl RunMetrics {
    /// Merge the values from another metrics instance into this one.
    pub fn merge(&mut self, other: &RunMetrics) {
        self.roots_matched += other.roots_matched;
        self.records_emitted += other.records_emitted;
        self.fields_defaulted += other.fields_defaulted;
        self.items_skipped += other.items_skipped;
        self.navigate_ms += other.navigate_ms;
        self.extract_ms += other.extract_ms;
    }
}

/// Start a stage timer using [`Instant::now`].
pub fn start_stage_timer() -> Instant {
    Instant::now()
}

/// Return the elapsed milliseconds since the provided start instant.
pub fn stage_elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_combines_two_instances() {
        let mut a = RunMetrics {
            roots_matched: 3,
            records_emitted: 2,
            fields_defaulted: 1,
            items_skipped: 1,
            navigate_ms: 40,
            extract_ms: 10,
        };
        let b = RunMetrics {
            roots_matched: 1,
            records_emitted: 1,
            fields_defaulted: 0,
            items_skipped: 0,
            navigate_ms: 5,
            extract_ms: 5,
        };

        a.merge(&b);
        assert_eq!(a.roots_matched, 4);
        assert_eq!(a.records_emitted, 3);
        assert_eq!(a.fields_defaulted, 1);
        assert_eq!(a.items_skipped, 1);
        assert_eq!(a.navigate_ms, 45);
        assert_eq!(a.extract_ms, 15);
    }

    #[test]
    fn timer_reports_elapsed_millis() {
        let start = start_stage_timer();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(stage_elapsed_ms(start) >= 10);
    }
}
