//! # Keep-Alive Configuration
//!
//! Configuration for the keep-alive service, loadable from TOML.
//!
//! ```toml
//! guard_tag_prefix = "AlarmPing.client."
//! inexact_window_ms = 1000
//!
//! # Optional: pretend the platform only has these timer capabilities.
//! [timer_capabilities]
//! exact = true
//! allow_while_idle = false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TimerCapabilities;

/// Default prefix for suspend-prevention hold names.
pub const DEFAULT_GUARD_TAG_PREFIX: &str = "AlarmPing.client.";

/// Keep-alive service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// Prefix of every guard name; the client id is appended.
    pub guard_tag_prefix: String,

    /// Batching window for inexact-tier timers, in milliseconds.
    pub inexact_window_ms: u64,

    /// Override the capabilities the timer adapter reports.
    /// `None` means the adapter's own (full) capability.
    pub timer_capabilities: Option<TimerCapabilities>,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            guard_tag_prefix: DEFAULT_GUARD_TAG_PREFIX.to_string(),
            inexact_window_ms: 1_000,
            timer_capabilities: None,
        }
    }
}

impl KeepAliveConfig {
    /// Create a config for testing (no batching, short prefix).
    pub fn for_testing() -> Self {
        Self {
            guard_tag_prefix: "test.".to_string(),
            inexact_window_ms: 0,
            timer_capabilities: None,
        }
    }

    /// Inexact batching window as a `Duration`.
    pub fn inexact_window(&self) -> Duration {
        Duration::from_millis(self.inexact_window_ms)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = KeepAliveConfig::default();
        assert_eq!(config.guard_tag_prefix, DEFAULT_GUARD_TAG_PREFIX);
        assert_eq!(config.inexact_window(), Duration::from_secs(1));
        assert!(config.timer_capabilities.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = KeepAliveConfig::from_toml_str("").unwrap();
        assert_eq!(config, KeepAliveConfig::default());
    }

    #[test]
    fn test_parse_capability_override() {
        let config = KeepAliveConfig::from_toml_str(
            r#"
            guard_tag_prefix = "svc."
            [timer_capabilities]
            exact = true
            allow_while_idle = false
            "#,
        )
        .unwrap();
        assert_eq!(config.guard_tag_prefix, "svc.");
        assert_eq!(
            config.timer_capabilities,
            Some(TimerCapabilities::exact_only())
        );
    }

    #[test]
    fn test_parse_error() {
        let err = KeepAliveConfig::from_toml_str("inexact_window_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "inexact_window_ms = 250").unwrap();
        let config = KeepAliveConfig::load(file.path()).unwrap();
        assert_eq!(config.inexact_window_ms, 250);
    }

    #[test]
    fn test_load_missing_file() {
        let err = KeepAliveConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
