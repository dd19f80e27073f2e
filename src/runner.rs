//! Test execution against a single squishserver.
//!
//! One invocation is one `squishrunner` subprocess pointed at one server.
//! squishrunner is told to exit with a dedicated code when the test ran to
//! completion but its verifications failed, so "test failed" stays
//! distinguishable from "could not run the test at all". Durations are
//! measured around the whole invocation regardless of verdict; the
//! scheduler cares about how long a test occupies a server, not whether it
//! passed.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::config::Server;
use crate::discovery::TestCase;

/// Exit code squishrunner is told to use for a test that ran and failed
/// its verifications. Any other non-zero exit means the invocation itself
/// went wrong.
pub const FAILED_TEST_EXIT_CODE: i32 = 44;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors for invocations that never produced a test verdict.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The squishrunner binary could not be spawned.
    #[error("Failed to launch squishrunner: {0}")]
    Launch(#[source] std::io::Error),

    /// squishrunner exited with a code that is neither pass nor the
    /// failed-test code.
    #[error("squishrunner exited with unexpected code {code}: {stderr}")]
    UnexpectedExit { code: i32, stderr: String },

    /// squishrunner was killed by a signal before producing a verdict.
    #[error("squishrunner terminated by signal: {stderr}")]
    Terminated { stderr: String },
}

/// The verdict of one completed test invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    /// Whether every verification in the test passed.
    pub passed: bool,
    /// Wall-clock time the invocation occupied the server.
    pub duration: Duration,
}

/// Runs one test case against one server.
///
/// The distributor only talks to this trait, so tests can substitute a
/// deterministic fake and drive the whole dispatch loop without a Squish
/// installation.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Executes `test` on `server`, occupying this worker until it ends.
    ///
    /// `Ok` covers both verdicts squishrunner can deliver (passed, or ran
    /// and failed). `Err` means the invocation fell over before producing
    /// a verdict; callers that still want a duration for that case should
    /// measure around the call.
    async fn run(&self, test: &TestCase, server: &Server) -> RunnerResult<Invocation>;
}

/// [`TestRunner`] backed by the squishrunner command line tool.
pub struct SquishRunner {
    squishrunner: PathBuf,
}

impl SquishRunner {
    pub fn new(squishrunner: impl Into<PathBuf>) -> Self {
        Self {
            squishrunner: squishrunner.into(),
        }
    }

    fn command(&self, test: &TestCase, server: &Server) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.squishrunner);
        cmd.arg("--host")
            .arg(&server.host)
            .arg("--port")
            .arg(server.port.to_string())
            .arg("--testsuite")
            .arg(&test.suite)
            .arg("--testcase")
            .arg(&test.name)
            .arg("--exitCodeOnFail")
            .arg(FAILED_TEST_EXIT_CODE.to_string())
            .arg("--reportgen")
            .arg("null");
        cmd
    }
}

#[async_trait]
impl TestRunner for SquishRunner {
    async fn run(&self, test: &TestCase, server: &Server) -> RunnerResult<Invocation> {
        let mut cmd = self.command(test, server);
        debug!("Running {:?}", cmd.as_std());

        let start = Instant::now();
        let output = cmd.output().await.map_err(RunnerError::Launch)?;
        let duration = start.elapsed();

        let stderr = || String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(Invocation {
                passed: true,
                duration,
            }),
            Some(FAILED_TEST_EXIT_CODE) => {
                debug!("Test case {} failed on {}", test.id(), server);
                Ok(Invocation {
                    passed: false,
                    duration,
                })
            }
            Some(code) => Err(RunnerError::UnexpectedExit {
                code,
                stderr: stderr(),
            }),
            None => Err(RunnerError::Terminated { stderr: stderr() }),
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_squishrunner(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("squishrunner");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn test_case(dir: &Path) -> TestCase {
        TestCase {
            name: "tst_example".to_string(),
            suite: dir.join("suite_x"),
        }
    }

    fn server() -> Server {
        Server::new("127.0.0.1", 4432)
    }

    #[tokio::test]
    async fn test_exit_zero_means_passed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SquishRunner::new(fake_squishrunner(dir.path(), "exit 0"));

        let invocation = runner.run(&test_case(dir.path()), &server()).await.unwrap();
        assert!(invocation.passed);
    }

    #[tokio::test]
    async fn test_failure_code_means_ran_and_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SquishRunner::new(fake_squishrunner(dir.path(), "exit 44"));

        let invocation = runner.run(&test_case(dir.path()), &server()).await.unwrap();
        assert!(!invocation.passed);
    }

    #[tokio::test]
    async fn test_other_exit_codes_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner =
            SquishRunner::new(fake_squishrunner(dir.path(), "echo 'no license' >&2; exit 7"));

        let err = runner
            .run(&test_case(dir.path()), &server())
            .await
            .unwrap_err();
        match err {
            RunnerError::UnexpectedExit { code, stderr } => {
                assert_eq!(code, 7);
                assert_eq!(stderr, "no license");
            }
            other => panic!("expected UnexpectedExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_launch_error() {
        let runner = SquishRunner::new("/nonexistent/squishrunner");
        let dir = tempfile::tempdir().unwrap();

        let err = runner
            .run(&test_case(dir.path()), &server())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Launch(_)));
    }

    #[test]
    fn test_command_carries_server_and_test() {
        let runner = SquishRunner::new("/opt/squish/bin/squishrunner");
        let test = TestCase {
            name: "tst_login".to_string(),
            suite: PathBuf::from("/suites/suite_app"),
        };
        let cmd = runner.command(&test, &Server::new("10.0.0.1", 4433));

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--host",
                "10.0.0.1",
                "--port",
                "4433",
                "--testsuite",
                "/suites/suite_app",
                "--testcase",
                "tst_login",
                "--exitCodeOnFail",
                "44",
                "--reportgen",
                "null",
            ]
        );
    }
}
