//! Result collection and history feedback.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::warn;

use super::ExecutionResult;
use crate::history::TimingHistory;

/// Collects results as workers finish tests, then feeds the measured
/// durations back into the timing history once the run is over.
///
/// Insertion is lock-guarded because two workers can finish at the same
/// instant. Keys are test identifiers, so each test contributes exactly
/// one entry.
#[derive(Default)]
pub struct Aggregator {
    results: Mutex<HashMap<String, ExecutionResult>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed test. Called concurrently by workers.
    pub async fn collect(&self, result: ExecutionResult) {
        let mut results = self.results.lock().await;
        if let Some(previous) = results.insert(result.test.id().to_string(), result) {
            // Each test is popped from the backlog exactly once, so a
            // second result for one identifier means duplicate tst_*
            // directory names on disk.
            warn!("Duplicate result for test case {}", previous.test.id());
        }
    }

    /// Number of results collected so far.
    pub async fn len(&self) -> usize {
        self.results.lock().await.len()
    }

    /// Finishes the run: appends every measured duration to `history`,
    /// persists it, and returns the results sorted by test identifier.
    ///
    /// Durations are recorded for failed and errored tests too. Occupancy
    /// is what matters for scheduling, and a test that failed in ninety
    /// seconds still held its server for ninety seconds.
    pub fn finish(self, history: &mut TimingHistory) -> Result<Vec<ExecutionResult>> {
        let mut results: Vec<ExecutionResult> =
            self.results.into_inner().into_values().collect();
        results.sort_by(|a, b| a.test.id().cmp(b.test.id()));

        for result in &results {
            history.record(result.test.id(), result.duration.as_secs_f64());
        }
        history.save()?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Server;
    use crate::discovery::TestCase;
    use crate::dispatch::TestOutcome;
    use std::path::PathBuf;
    use std::time::Duration;

    fn result(name: &str, outcome: TestOutcome, seconds: f64) -> ExecutionResult {
        ExecutionResult {
            test: TestCase {
                name: name.to_string(),
                suite: PathBuf::from("/suites/suite_x"),
            },
            server: Server::new("127.0.0.1", 4432),
            outcome,
            duration: Duration::from_secs_f64(seconds),
        }
    }

    #[tokio::test]
    async fn test_finish_sorts_by_test_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TimingHistory::new(dir.path().join("history.json"));

        let aggregator = Aggregator::new();
        aggregator
            .collect(result("tst_c", TestOutcome::Passed, 1.0))
            .await;
        aggregator
            .collect(result("tst_a", TestOutcome::Failed, 2.0))
            .await;
        aggregator
            .collect(result("tst_b", TestOutcome::Passed, 3.0))
            .await;

        let results = aggregator.finish(&mut history).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.test.id()).collect();
        assert_eq!(ids, vec!["tst_a", "tst_b", "tst_c"]);
    }

    #[tokio::test]
    async fn test_finish_records_every_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut history = TimingHistory::new(&path);

        let aggregator = Aggregator::new();
        aggregator
            .collect(result("tst_pass", TestOutcome::Passed, 10.0))
            .await;
        aggregator
            .collect(result("tst_fail", TestOutcome::Failed, 20.0))
            .await;
        aggregator
            .collect(result("tst_err", TestOutcome::Error, 30.0))
            .await;

        aggregator.finish(&mut history).unwrap();
        assert_eq!(history.mean("tst_pass"), 10.0);
        assert_eq!(history.mean("tst_fail"), 20.0);
        assert_eq!(history.mean("tst_err"), 30.0);

        // finish also persisted the history.
        let reloaded = TimingHistory::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TimingHistory::new(dir.path().join("history.json"));

        let aggregator = Aggregator::new();
        aggregator
            .collect(result("tst_a", TestOutcome::Passed, 1.0))
            .await;
        aggregator
            .collect(result("tst_a", TestOutcome::Failed, 2.0))
            .await;
        assert_eq!(aggregator.len().await, 1);

        let results = aggregator.finish(&mut history).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, TestOutcome::Failed);
    }
}
