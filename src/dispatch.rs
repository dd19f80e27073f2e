//! Work distribution across the server pool.
//!
//! # Architecture
//!
//! ```text
//!                    ┌────────────────────┐
//!   discovery ──────▶│ Scheduler          │  longest expected first
//!                    │  (timing history)  │
//!                    └─────────┬──────────┘
//!                              ▼
//!                    ┌────────────────────┐
//!                    │ shared backlog     │  Mutex<VecDeque<TestCase>>
//!                    └─┬───────┬────────┬─┘
//!                 pop  │       │        │  pop
//!                      ▼       ▼        ▼
//!                 ┌────────┐ ┌────────┐ ┌────────┐
//!                 │ worker │ │ worker │ │ worker │   one per server
//!                 └───┬────┘ └───┬────┘ └───┬────┘
//!                     └──────────┼──────────┘
//!                                ▼
//!                    ┌────────────────────┐
//!                    │ Aggregator         │  results + history feedback
//!                    └────────────────────┘
//! ```
//!
//! The backlog is a single shared queue. Every configured server gets
//! exactly one worker, and each worker pulls the next test the moment its
//! server is free, so fast servers naturally absorb more of the backlog
//! than slow ones. Nothing is pre-partitioned and nothing is requeued: a
//! popped test produces exactly one result, even when its invocation
//! falls over.

pub mod aggregator;
pub mod scheduler;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info};

pub use aggregator::Aggregator;
pub use scheduler::Scheduler;

use crate::config::Server;
use crate::discovery::TestCase;
use crate::history::TimingHistory;
use crate::report::Reporter;
use crate::runner::TestRunner;

/// The verdict class of one executed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// Ran to completion and every verification passed.
    Passed,
    /// Ran to completion and a verification failed.
    Failed,
    /// The invocation fell over before producing a verdict.
    Error,
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

/// The complete record of one executed test.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub test: TestCase,
    /// The server the test ran on.
    pub server: Server,
    pub outcome: TestOutcome,
    /// How long the test occupied its server.
    pub duration: Duration,
}

/// Aggregated results of an entire run.
///
/// This is the return value of [`Distributor::run`] and is handed to
/// reporters for final output.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Size of the backlog handed to the distributor.
    pub total: usize,

    /// Number of tests that passed.
    pub passed: usize,

    /// Number of tests that ran and failed a verification.
    pub failed: usize,

    /// Number of tests whose invocation fell over without a verdict.
    pub errors: usize,

    /// Wall-clock duration of the whole run.
    pub duration: Duration,

    /// Per-test results, sorted by test identifier.
    pub results: Vec<ExecutionResult>,
}

impl RunReport {
    /// Returns `true` when every test ran and passed.
    ///
    /// # Example
    ///
    /// ```
    /// use farmout::dispatch::RunReport;
    /// use std::time::Duration;
    ///
    /// let report = RunReport {
    ///     total: 12,
    ///     passed: 12,
    ///     failed: 0,
    ///     errors: 0,
    ///     duration: Duration::from_secs(60),
    ///     results: vec![],
    /// };
    ///
    /// assert!(report.success());
    /// assert_eq!(report.exit_code(), 0);
    /// ```
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// Returns the process exit code for this run: 0 when everything
    /// passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }
}

/// Drains an ordered backlog across the server pool.
///
/// One worker per configured server pulls tests off a shared queue until
/// the queue is empty, so the pool balances itself by availability: a
/// server that finishes early simply takes the next test.
///
/// # Type Parameters
///
/// - `R`: The test runner type
/// - `P`: The reporter type
pub struct Distributor<R, P> {
    servers: Vec<Server>,
    runner: R,
    reporter: P,
}

impl<R: TestRunner, P: Reporter> Distributor<R, P> {
    pub fn new(servers: Vec<Server>, runner: R, reporter: P) -> Self {
        Self {
            servers,
            runner,
            reporter,
        }
    }

    /// Runs every test in `backlog`, one worker per configured server,
    /// then persists the measured durations into `history`.
    ///
    /// A runner error marks that single test as [`TestOutcome::Error`] and
    /// the worker moves on; it never aborts the batch or requeues the
    /// test. Workers stop when the backlog is empty, and this function
    /// returns once all of them have.
    pub async fn run(
        &self,
        backlog: Vec<TestCase>,
        history: &mut TimingHistory,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let total = backlog.len();
        info!(
            "Distributing {} test cases across {} servers",
            total,
            self.servers.len()
        );
        self.reporter.on_backlog_ready(&backlog).await;

        let queue: Mutex<VecDeque<TestCase>> = Mutex::new(backlog.into());
        let aggregator = Aggregator::new();

        tokio_scoped::scope(|scope| {
            for server in &self.servers {
                let queue = &queue;
                let aggregator = &aggregator;
                let runner = &self.runner;
                let reporter = &self.reporter;

                scope.spawn(async move {
                    let mut executed = 0usize;
                    loop {
                        let next = queue.lock().await.pop_front();
                        let Some(test) = next else { break };

                        reporter.on_test_start(&test).await;
                        let picked_up = Instant::now();
                        let result = match runner.run(&test, server).await {
                            Ok(invocation) => ExecutionResult {
                                outcome: if invocation.passed {
                                    TestOutcome::Passed
                                } else {
                                    TestOutcome::Failed
                                },
                                duration: invocation.duration,
                                test,
                                server: server.clone(),
                            },
                            Err(err) => {
                                error!("Test case {} errored on {}: {}", test.id(), server, err);
                                ExecutionResult {
                                    outcome: TestOutcome::Error,
                                    duration: picked_up.elapsed(),
                                    test,
                                    server: server.clone(),
                                }
                            }
                        };
                        reporter.on_test_complete(&result).await;
                        aggregator.collect(result).await;
                        executed += 1;
                    }
                    info!("Server {} executed {} test cases", server, executed);
                });
            }
        });

        let results = aggregator.finish(history)?;

        let passed = results
            .iter()
            .filter(|r| r.outcome == TestOutcome::Passed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.outcome == TestOutcome::Failed)
            .count();
        let errors = results
            .iter()
            .filter(|r| r.outcome == TestOutcome::Error)
            .count();

        let report = RunReport {
            total,
            passed,
            failed,
            errors,
            duration: start.elapsed(),
            results,
        };
        self.reporter.on_run_complete(&report).await;
        Ok(report)
    }
}
