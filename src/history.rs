//! Persistent per-test duration history.
//!
//! Scheduling long tests first requires knowing how long each test took in
//! earlier runs. [`TimingHistory`] owns that knowledge: a map from test
//! identifier to every duration ever observed for it, persisted as JSON
//! between runs:
//!
//! ```json
//! {
//!     "tst_login": [12.5, 11.8, 13.1],
//!     "tst_checkout": [48.0, 51.2]
//! }
//! ```
//!
//! The file is read once when a run starts (a missing file just means an
//! empty history) and rewritten once when the run ends. A single farmout
//! process is the only writer; two instances sharing a history file will
//! lose one instance's samples.
//!
//! Samples are append-only and unbounded. Every run adds one duration per
//! executed test and nothing is evicted, so the derived statistics reflect
//! the full record at the cost of file growth proportional to run count.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Accumulated execution durations for every known test, in seconds.
#[derive(Debug)]
pub struct TimingHistory {
    path: PathBuf,
    samples: HashMap<String, Vec<f64>>,
}

impl TimingHistory {
    /// Creates an empty history that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            samples: HashMap::new(),
        }
    }

    /// Loads history from `path`.
    ///
    /// A missing file yields an empty history. A file that exists but does
    /// not parse is an error: scheduling quality depends on this data, so a
    /// corrupt file should be noticed rather than silently discarded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No history file at {}, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;
        let samples = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))?;
        debug!("Loaded history from {}", path.display());
        Ok(Self { path, samples })
    }

    /// Appends one observed duration for `test_id`, creating the sample
    /// sequence if this is the first observation.
    ///
    /// Negative and non-finite values are dropped. Durations measured from
    /// a monotonic clock can be neither, so tripping this guard means the
    /// caller fed in garbage.
    pub fn record(&mut self, test_id: &str, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            warn!("Ignoring invalid duration {} for {}", seconds, test_id);
            return;
        }
        self.samples
            .entry(test_id.to_string())
            .or_default()
            .push(seconds);
    }

    /// Arithmetic mean duration for `test_id`, or 0.0 with no samples.
    pub fn mean(&self, test_id: &str) -> f64 {
        match self.samples.get(test_id) {
            Some(samples) if !samples.is_empty() => {
                samples.iter().sum::<f64>() / samples.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Median duration for `test_id`, or 0.0 with no samples.
    ///
    /// With an even sample count this is the mean of the two middle values.
    pub fn median(&self, test_id: &str) -> f64 {
        let Some(samples) = self.samples.get(test_id) else {
            return 0.0;
        };
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Sample standard deviation for `test_id`.
    ///
    /// Uses the n-1 denominator. Returns 0.0 with fewer than two samples,
    /// where spread is undefined.
    pub fn stddev(&self, test_id: &str) -> f64 {
        let Some(samples) = self.samples.get(test_id) else {
            return 0.0;
        };
        if samples.len() < 2 {
            return 0.0;
        }
        let mean = self.mean(test_id);
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>()
            / (samples.len() - 1) as f64;
        variance.sqrt()
    }

    /// Mean of the per-test means across every known test.
    ///
    /// This is the scheduling weight for tests with no history of their
    /// own: unknown tests land in the middle of the pack instead of racing
    /// to the front or back. Returns 0.0 when the history is empty.
    pub fn overall_mean(&self) -> f64 {
        let mut total = 0.0;
        let mut known = 0usize;
        for (id, samples) in &self.samples {
            if !samples.is_empty() {
                total += self.mean(id);
                known += 1;
            }
        }
        if known == 0 { 0.0 } else { total / known as f64 }
    }

    /// Whether `test_id` has at least one recorded duration.
    pub fn knows(&self, test_id: &str) -> bool {
        self.samples
            .get(test_id)
            .is_some_and(|samples| !samples.is_empty())
    }

    /// All test identifiers with at least one recorded duration, sorted.
    pub fn known_tests(&self) -> BTreeSet<&str> {
        self.samples
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Raw recorded durations for `test_id`, oldest first.
    pub fn samples(&self, test_id: &str) -> Option<&[f64]> {
        self.samples.get(test_id).map(Vec::as_slice)
    }

    /// Number of tests with any recorded history.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Persists the full history to its backing file.
    ///
    /// Writes to a temporary file in the target directory and renames it
    /// over the destination, so a crash mid-write leaves the previous file
    /// intact and a concurrent reader never sees a half-written one.
    pub fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.samples).context("Failed to serialize history")?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .context("Failed to write history")?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to replace history file: {}", self.path.display()))?;

        debug!(
            "Saved history for {} tests to {}",
            self.samples.len(),
            self.path.display()
        );
        Ok(())
    }
}
