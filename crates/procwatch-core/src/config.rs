//! Configuration for the procwatch daemon.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::CoreError;

/// Monitor engine configuration.
///
/// Field names follow the host protocol's camelCase convention so the same
/// shape works in the YAML config file and in an embedding host's JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Process sampling period in milliseconds.
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,

    /// Foreground-window sampling period in milliseconds.
    #[serde(default = "default_foreground_interval_ms")]
    pub foreground_interval_ms: u64,

    /// Ring-buffer capacity for snapshot history.
    #[serde(default = "default_max_in_memory_snapshots")]
    pub max_in_memory_snapshots: usize,

    /// Self-memory budget in megabytes; breaching it triggers the watchdog.
    #[serde(default = "default_max_memory_mb_self")]
    pub max_memory_mb_self: f64,

    /// Watchdog remediation when the self-memory budget is breached.
    #[serde(default)]
    pub on_memory_breach: BreachPolicy,
}

/// What the memory watchdog does on breach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreachPolicy {
    /// Trim snapshot history and keep running.
    #[default]
    Trim,
    /// Trim, then stop the engine with a distinguishing stop reason.
    TrimAndStop,
}

fn default_sampling_interval_ms() -> u64 {
    1000
}

fn default_foreground_interval_ms() -> u64 {
    1000
}

fn default_max_in_memory_snapshots() -> usize {
    60
}

fn default_max_memory_mb_self() -> f64 {
    200.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
            foreground_interval_ms: default_foreground_interval_ms(),
            max_in_memory_snapshots: default_max_in_memory_snapshots(),
            max_memory_mb_self: default_max_memory_mb_self(),
            on_memory_breach: BreachPolicy::default(),
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Default config file location: `~/.procwatch/config.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".procwatch")
            .join("config.yaml")
    }

    /// Load configuration from the default path, falling back to defaults
    /// when the file is missing or unparseable.
    pub fn load() -> Self {
        let path = Self::default_path();

        if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }
}
