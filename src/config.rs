//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::hotkey::ListenerTimings;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// User settings file
    pub settings_path: PathBuf,

    /// Key listener supervision timers
    pub listener: ListenerTimings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("AUTOCLICK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home).join(".local").join("share").join("autoclick")
            }
        };

        let settings_path = lookup("AUTOCLICK_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("config.txt"));
        let socket_path = data_dir.join("daemon.sock");

        let defaults = ListenerTimings::default();
        let listener = ListenerTimings {
            watchdog: millis(&lookup, "AUTOCLICK_WATCHDOG_MS", defaults.watchdog),
            probe: millis(&lookup, "AUTOCLICK_PROBE_MS", defaults.probe),
            retry: millis(&lookup, "AUTOCLICK_RETRY_MS", defaults.retry),
        };

        Ok(Self {
            socket_path,
            data_dir,
            settings_path,
            listener,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

/// A positive millisecond duration from `key`, or `default`
fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    let Some(value) = lookup(key) else {
        return default;
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Duration::from_millis(ms),
        _ => {
            warn!(
                key,
                %value,
                default_ms = default.as_millis() as u64,
                "invalid duration, using default"
            );
            default
        }
    }
}
