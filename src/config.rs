//! Configuration loading and schema.
//!
//! farmout reads a single YAML file naming the squishserver pool and the
//! squishrunner binary used to drive it:
//!
//! ```yaml
//! servers:
//!   - "192.168.1.100:4432"
//!   - "192.168.1.100:4433"
//!   - "192.168.1.101:4432"
//! squishrunner: /opt/squish/bin/squishrunner
//! history_file: farmout-history.json
//! ```
//!
//! Server addresses are plain `host:port` strings. The pool is fixed for
//! the lifetime of a run; servers are never added or removed mid-run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Error produced when a server address cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid server address `{input}`: expected `host:port` with a numeric port")]
pub struct ParseServerError {
    input: String,
}

/// A single squishserver endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Server {
    type Err = ParseServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // rsplit so hosts containing colons keep everything up to the
        // last separator as the host part.
        s.rsplit_once(':')
            .and_then(|(host, port)| {
                if host.is_empty() {
                    return None;
                }
                let port = port.parse::<u16>().ok()?;
                Some(Self::new(host, port))
            })
            .ok_or_else(|| ParseServerError {
                input: s.to_string(),
            })
    }
}

impl TryFrom<String> for Server {
    type Error = ParseServerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Squishserver endpoints to distribute test cases across.
    pub servers: Vec<Server>,

    /// Path to the squishrunner binary used to drive the servers.
    pub squishrunner: PathBuf,

    /// Where per-test duration history is persisted between runs.
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

fn default_history_file() -> PathBuf {
    PathBuf::from("farmout-history.json")
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    load_config_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a YAML string.
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content).context("Invalid YAML configuration")?;
    Ok(config)
}
