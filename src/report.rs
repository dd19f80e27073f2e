//! Run progress and result display.

use std::sync::Mutex;

use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::discovery::TestCase;
use crate::dispatch::{ExecutionResult, RunReport, TestOutcome};

/// Receives events as a run progresses.
///
/// Workers call [`Reporter::on_test_start`] and
/// [`Reporter::on_test_complete`] concurrently, in completion order, not
/// backlog order.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Called once with the full ordered backlog before dispatch starts.
    async fn on_backlog_ready(&self, tests: &[TestCase]);

    /// Called when a worker picks up a test.
    async fn on_test_start(&self, test: &TestCase);

    /// Called when a test finishes.
    async fn on_test_complete(&self, result: &ExecutionResult);

    /// Called once after every worker has stopped and the timing history
    /// has been persisted.
    async fn on_run_complete(&self, report: &RunReport);
}

/// A reporter that swallows every event. Useful in tests and as a base
/// for partial implementations.
pub struct NullReporter;

#[async_trait]
impl Reporter for NullReporter {
    async fn on_backlog_ready(&self, _tests: &[TestCase]) {}
    async fn on_test_start(&self, _test: &TestCase) {}
    async fn on_test_complete(&self, _result: &ExecutionResult) {}
    async fn on_run_complete(&self, _report: &RunReport) {}
}

/// Console reporter with a progress bar and a colored per-test summary.
pub struct ConsoleReporter {
    progress: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            progress: Mutex::new(None),
            verbose,
        }
    }

    fn outcome_label(outcome: TestOutcome) -> String {
        match outcome {
            TestOutcome::Passed => style("PASS").green().to_string(),
            TestOutcome::Failed => style("FAIL").red().to_string(),
            TestOutcome::Error => style("ERROR").red().bold().to_string(),
        }
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn on_backlog_ready(&self, tests: &[TestCase]) {
        println!("Distributing {} test cases", tests.len());

        let bar = ProgressBar::new(tests.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        *self.progress.lock().unwrap() = Some(bar);
    }

    async fn on_test_start(&self, test: &TestCase) {
        if self.verbose {
            if let Some(bar) = self.progress.lock().unwrap().as_ref() {
                bar.println(format!("Running: {}", test.id()));
            }
        }
    }

    async fn on_test_complete(&self, result: &ExecutionResult) {
        let guard = self.progress.lock().unwrap();
        if let Some(bar) = guard.as_ref() {
            bar.inc(1);
            // Failures surface immediately; passes only when asked for.
            if self.verbose || !result.outcome.is_pass() {
                bar.println(format!(
                    "{} {} on {} ({:.1}s)",
                    Self::outcome_label(result.outcome),
                    result.test.id(),
                    result.server,
                    result.duration.as_secs_f64()
                ));
            }
        }
    }

    async fn on_run_complete(&self, report: &RunReport) {
        if let Some(bar) = self.progress.lock().unwrap().take() {
            bar.finish_and_clear();
        }

        println!();
        println!("Test execution results:");
        for result in &report.results {
            println!(
                "  {} {} on {} ({:.1}s)",
                Self::outcome_label(result.outcome),
                result.test.id(),
                result.server,
                result.duration.as_secs_f64()
            );
        }

        println!();
        println!("  Total:  {}", report.total);
        println!("  Passed: {}", style(report.passed).green());
        println!("  Failed: {}", style(report.failed).red());
        if report.errors > 0 {
            println!("  Errors: {}", style(report.errors).red().bold());
        }
        println!("  Duration: {:.1}s", report.duration.as_secs_f64());
        println!();

        if report.success() {
            println!("{}", style("All test cases passed!").green().bold());
        } else {
            println!("{}", style("Some test cases did not pass.").red().bold());
        }
    }
}
