//! Client configuration, read from an optional TOML file.

use anyhow::Context;
use serde::Deserialize;
use socialnet_client::buffer::DEFAULT_CAPACITY;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Request-reply endpoint for commands.
    pub command_url: String,
    /// Endpoint the server pushes notifications on.
    pub notify_url: String,
    /// Directory holding one audit log per user.
    pub log_dir: PathBuf,
    pub notification_capacity: usize,
    /// Extra `tracing` directives, comma separated.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_url: "ws://localhost:5555".to_string(),
            notify_url: "ws://localhost:6010".to_string(),
            log_dir: PathBuf::from("logs"),
            notification_capacity: DEFAULT_CAPACITY,
            log_filter: None,
        }
    }
}

impl Config {
    /// Load from `path`, or fall back to defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
