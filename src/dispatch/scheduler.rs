//! Backlog ordering.
//!
//! Longest-expected-first: on a fixed pool of servers, starting the long
//! tests early keeps a slow test from being picked up last and dragging
//! the run out on its own. The expectation is the historical mean
//! duration. Tests never seen before weigh in at the average across all
//! known tests, so they land somewhere in the middle of the backlog
//! rather than first or last.

use std::cmp::Ordering;

use tracing::debug;

use crate::discovery::TestCase;
use crate::history::TimingHistory;

/// Orders a test backlog by expected duration.
pub struct Scheduler<'a> {
    history: &'a TimingHistory,
}

impl<'a> Scheduler<'a> {
    pub fn new(history: &'a TimingHistory) -> Self {
        Self { history }
    }

    /// The scheduling weight of one test: its historical mean, or
    /// `fallback` when the test has no history of its own.
    fn weight(&self, test: &TestCase, fallback: f64) -> f64 {
        if self.history.knows(test.id()) {
            self.history.mean(test.id())
        } else {
            fallback
        }
    }

    /// Returns the backlog sorted by descending expected duration.
    ///
    /// The sort is stable: tests with equal weights keep their incoming
    /// (discovery) order, so the schedule is deterministic for a given
    /// history and test tree.
    pub fn prioritize(&self, backlog: Vec<TestCase>) -> Vec<TestCase> {
        // The fallback averages over the whole history, not just the tests
        // in this backlog, so a freshly added test is weighted by what the
        // suite as a whole usually costs.
        let fallback = self.history.overall_mean();
        debug!(
            "Prioritizing {} tests (fallback weight {:.1}s)",
            backlog.len(),
            fallback
        );

        let mut ordered = backlog;
        ordered.sort_by(|a, b| {
            let wa = self.weight(a, fallback);
            let wb = self.weight(b, fallback);
            wb.partial_cmp(&wa).unwrap_or(Ordering::Equal)
        });
        ordered
    }
}
