//! Test case discovery.
//!
//! A Squish test case is a directory whose name starts with `tst_`, living
//! inside a test suite directory. Discovery walks a directory tree and
//! collects every such directory, in a stable name-sorted order so two
//! walks of the same tree always produce the same backlog.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

/// Directory name prefix that marks a Squish test case.
const TEST_DIR_PREFIX: &str = "tst_";

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that can occur during test discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The discovery root does not exist or is not a directory.
    #[error("Test directory not found: {0}")]
    NotFound(PathBuf),

    /// I/O error while walking the directory tree.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single Squish test case found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TestCase {
    /// Test identifier: the `tst_*` directory name.
    pub name: String,
    /// The suite directory containing this test case.
    pub suite: PathBuf,
}

impl TestCase {
    /// Builds a test case from its on-disk directory.
    ///
    /// Returns `None` when the path has no final component or no parent,
    /// which cannot happen for paths produced by [`find_test_cases`].
    pub fn from_dir(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let suite = path.parent()?.to_path_buf();
        Some(Self { name, suite })
    }

    /// The identifier used for history keys and reporting.
    pub fn id(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suite.join(&self.name).display())
    }
}

/// Recursively finds all Squish test cases under `root`.
///
/// Entries are visited in name order at every level, so the returned list
/// is deterministic for a given tree. The scheduler relies on this order
/// for tie-breaking.
pub fn find_test_cases(root: &Path) -> DiscoveryResult<Vec<TestCase>> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }

    let mut found = Vec::new();
    walk(root, &mut found)?;
    info!("Found {} test cases in {}", found.len(), root.display());
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<TestCase>) -> DiscoveryResult<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    for path in entries {
        if !path.is_dir() {
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEST_DIR_PREFIX));
        if is_test {
            debug!("Found test case: {}", path.display());
            if let Some(test) = TestCase::from_dir(&path) {
                found.push(test);
            }
        }
        // Suites can sit at any depth, so keep walking either way.
        walk(&path, found)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_dir(path: &Path) {
        fs::create_dir_all(path).unwrap();
    }

    #[test]
    fn test_finds_test_case_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch_dir(&dir.path().join("suite_app").join("tst_login"));
        touch_dir(&dir.path().join("suite_app").join("tst_checkout"));
        touch_dir(&dir.path().join("suite_admin").join("tst_users"));
        touch_dir(&dir.path().join("suite_app").join("shared_scripts"));
        fs::write(dir.path().join("suite_app").join("suite.conf"), "").unwrap();

        let tests = find_test_cases(dir.path()).unwrap();
        let names: Vec<&str> = tests.iter().map(|t| t.id()).collect();
        assert_eq!(names, vec!["tst_users", "tst_checkout", "tst_login"]);
    }

    #[test]
    fn test_suite_paths_point_at_parent() {
        let dir = tempfile::tempdir().unwrap();
        let suite = dir.path().join("suite_app");
        touch_dir(&suite.join("tst_login"));

        let tests = find_test_cases(dir.path()).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "tst_login");
        assert_eq!(tests[0].suite, suite);
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tst_c", "tst_a", "tst_b"] {
            touch_dir(&dir.path().join("suite_x").join(name));
        }

        let first = find_test_cases(dir.path()).unwrap();
        let second = find_test_cases(dir.path()).unwrap();
        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|t| t.id()).collect();
        assert_eq!(names, vec!["tst_a", "tst_b", "tst_c"]);
    }

    #[test]
    fn test_ignores_files_with_test_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch_dir(&dir.path().join("suite_x"));
        fs::write(dir.path().join("suite_x").join("tst_notes.txt"), "").unwrap();

        let tests = find_test_cases(dir.path()).unwrap();
        assert!(tests.is_empty());
    }

    #[test]
    fn test_empty_tree_yields_no_tests() {
        let dir = tempfile::tempdir().unwrap();
        let tests = find_test_cases(dir.path()).unwrap();
        assert!(tests.is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = find_test_cases(Path::new("/nonexistent/suites"));
        assert!(matches!(result, Err(DiscoveryError::NotFound(_))));
    }

    #[test]
    fn test_display_includes_suite_and_name() {
        let test = TestCase {
            name: "tst_login".to_string(),
            suite: PathBuf::from("/suites/suite_app"),
        };
        assert_eq!(test.to_string(), "/suites/suite_app/tst_login");
    }
}
