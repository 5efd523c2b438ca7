//! Runtime configuration.
//!
//! ```toml
//! log_level = "info"
//!
//! [keepalive]
//! guard_tag_prefix = "AlarmPing.client."
//! inexact_window_ms = 1000
//!
//! [[clients]]
//! id = "sensor-1"
//! keep_alive_secs = 30
//! latency_ms = 80
//! fail_every = 5
//! ```

use std::path::{Path, PathBuf};

use alarm_ping::KeepAliveConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ALARM_PING_CONFIG";

/// One simulated client connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client identity.
    pub id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Simulated round-trip latency in milliseconds.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Fail every n-th ping (`None` never fails).
    #[serde(default)]
    pub fail_every: Option<u64>,
}

fn default_latency_ms() -> u64 {
    50
}

/// Top-level runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Keep-alive service settings.
    pub keepalive: KeepAliveConfig,
    /// Simulated connections to drive.
    pub clients: Vec<ClientConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            keepalive: KeepAliveConfig::default(),
            clients: vec![ClientConfig {
                id: "demo-client".to_string(),
                keep_alive_secs: 10,
                latency_ms: default_latency_ms(),
                fail_every: None,
            }],
        }
    }
}

impl RuntimeConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid runtime config")
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// Config file path: first CLI argument, else `ALARM_PING_CONFIG`.
pub fn config_path(mut args: impl Iterator<Item = String>, env: Option<String>) -> Option<PathBuf> {
    args.next().or(env).map(PathBuf::from)
}
