//! farmout - distributed execution of Squish GUI test suites.
//!
//! Squish tests are slow and independent, which makes a batch of them
//! embarrassingly parallel: with enough squishservers the wall-clock cost
//! of a run approaches the cost of its longest single test. farmout drives
//! that distribution and learns from every run it performs.
//!
//! # Architecture
//!
//! - [`discovery`] finds `tst_*` test-case directories under a suite tree.
//! - [`history`] persists how long every test took in past runs and
//!   derives per-test mean, median and spread.
//! - [`dispatch`] orders the backlog longest-expected-first and drains it
//!   with one worker per configured server; whichever server frees up
//!   next takes the next test.
//! - [`runner`] wraps a single squishrunner invocation against one server.
//! - [`report`] renders progress and the final per-test summary.
//! - [`config`] loads the YAML file naming the server pool.
//!
//! # Example
//!
//! ```no_run
//! use farmout::config::Server;
//! use farmout::dispatch::{Distributor, Scheduler};
//! use farmout::discovery::find_test_cases;
//! use farmout::history::TimingHistory;
//! use farmout::report::NullReporter;
//! use farmout::runner::SquishRunner;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut history = TimingHistory::load("farmout-history.json")?;
//! let tests = find_test_cases("suites".as_ref())?;
//! let backlog = Scheduler::new(&history).prioritize(tests);
//!
//! let servers = vec![Server::new("10.0.0.1", 4432), Server::new("10.0.0.2", 4432)];
//! let runner = SquishRunner::new("/opt/squish/bin/squishrunner");
//! let distributor = Distributor::new(servers, runner, NullReporter);
//!
//! let report = distributor.run(backlog, &mut history).await?;
//! println!("{} of {} passed", report.passed, report.total);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod history;
pub mod report;
pub mod runner;

pub use config::{Config, Server, load_config};
pub use discovery::{DiscoveryError, TestCase, find_test_cases};
pub use dispatch::{Distributor, ExecutionResult, RunReport, Scheduler, TestOutcome};
pub use history::TimingHistory;
pub use report::{ConsoleReporter, NullReporter, Reporter};
pub use runner::{Invocation, RunnerError, SquishRunner, TestRunner};
