//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so an empty file (or no file
//! at all) yields a working setup.
//!
//! ```toml
//! [book]
//! order_capacity = 1000000
//! volume_depth = 80
//!
//! [logger]
//! path = "trading_log.csv"
//! console = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub book: BookConfig,
    pub logger: LoggerConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Order book sizing and analytics windows
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Order slots pre-allocated in the pool
    pub order_capacity: usize,
    /// Price levels pre-allocated across both sides
    pub level_capacity: usize,
    /// Levels per side summed by `calculate_vols`
    pub volume_depth: usize,
    /// Entries kept in the mid-price and VOI histories (0 = unbounded)
    pub history_capacity: usize,
    /// Levels per side in line-protocol snapshots
    pub snapshot_depth: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            order_capacity: 1_000_000,
            level_capacity: 2_000,
            volume_depth: 80,
            history_capacity: 40_000,
            snapshot_depth: 20,
        }
    }
}

/// Async logger sinks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Trading log file (truncated on open)
    pub path: PathBuf,
    /// Initial size of the memory-mapped region in bytes
    pub buffer_size: usize,
    /// Mirror every record to stdout
    pub console: bool,
    /// Sleep between polls of an empty queue, in microseconds
    pub poll_interval_us: u64,
}

impl LoggerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trading_log.csv"),
            buffer_size: 10 * 1024 * 1024,
            console: false,
            poll_interval_us: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.book.volume_depth, 80);
        assert_eq!(config.logger.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            [book]
            volume_depth = 10

            [logger]
            path = "/tmp/run.csv"
            console = true
            "#,
        )
        .unwrap();

        assert_eq!(config.book.volume_depth, 10);
        assert_eq!(config.book.order_capacity, 1_000_000);
        assert_eq!(config.logger.path, PathBuf::from("/tmp/run.csv"));
        assert!(config.logger.console);
        assert_eq!(config.logger.buffer_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_config() {
        let err = EngineConfig::from_toml_str("[book]\nvolume_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
