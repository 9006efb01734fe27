//! Time-bounded outcome window
//!
//! Keeps success/failure outcomes observed within a sliding time window so
//! callers can decide on a failure *rate* instead of a raw counter. Bursty
//! but rare errors age out of the window instead of accumulating forever.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of recent outcomes
#[derive(Debug, Clone)]
pub struct OutcomeWindow {
    span: Duration,
    capacity: usize,
    outcomes: VecDeque<(Instant, bool)>,
    failures: usize,
}

impl OutcomeWindow {
    /// Create a window covering `span`, holding at most `capacity` outcomes
    pub fn new(span: Duration, capacity: usize) -> Self {
        Self { span, capacity: capacity.max(1), outcomes: VecDeque::new(), failures: 0 }
    }

    /// Record an outcome observed at `now`
    pub fn record(&mut self, now: Instant, success: bool) {
        self.evict(now);
        if self.outcomes.len() == self.capacity {
            if let Some((_, oldest_success)) = self.outcomes.pop_front() {
                if !oldest_success {
                    self.failures -= 1;
                }
            }
        }
        if !success {
            self.failures += 1;
        }
        self.outcomes.push_back((now, success));
    }

    /// Number of outcomes still inside the window at `now`
    pub fn total(&mut self, now: Instant) -> usize {
        self.evict(now);
        self.outcomes.len()
    }

    /// Failure rate in [0.0, 1.0] over the outcomes inside the window
    pub fn failure_rate(&mut self, now: Instant) -> f64 {
        self.evict(now);
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.outcomes.len() as f64
    }

    /// Drop every recorded outcome
    pub fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }

    fn evict(&mut self, now: Instant) {
        while let Some((at, success)) = self.outcomes.front().copied() {
            if now.saturating_duration_since(at) <= self.span {
                break;
            }
            self.outcomes.pop_front();
            if !success {
                self.failures -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates failure-rate computation over recorded outcomes.
    ///
    /// Assertions:
    /// - Confirms 3 failures out of 4 outcomes yields 0.75.
    #[test]
    fn test_failure_rate() {
        let now = Instant::now();
        let mut window = OutcomeWindow::new(Duration::from_secs(60), 100);

        window.record(now, false);
        window.record(now, false);
        window.record(now, true);
        window.record(now, false);

        assert_eq!(window.total(now), 4);
        assert!((window.failure_rate(now) - 0.75).abs() < f64::EPSILON);
    }

    /// Validates that outcomes older than the span age out.
    #[test]
    fn test_outcomes_age_out() {
        let start = Instant::now();
        let mut window = OutcomeWindow::new(Duration::from_secs(10), 100);

        window.record(start, false);
        window.record(start + Duration::from_secs(5), true);

        let later = start + Duration::from_secs(12);
        assert_eq!(window.total(later), 1);
        assert_eq!(window.failure_rate(later), 0.0);
    }

    /// Validates that capacity evicts the oldest outcome and keeps the
    /// failure count consistent.
    #[test]
    fn test_capacity_evicts_oldest() {
        let now = Instant::now();
        let mut window = OutcomeWindow::new(Duration::from_secs(60), 2);

        window.record(now, false);
        window.record(now, true);
        window.record(now, true);

        assert_eq!(window.total(now), 2);
        assert_eq!(window.failure_rate(now), 0.0);

        window.clear();
        assert_eq!(window.total(now), 0);
    }
}
