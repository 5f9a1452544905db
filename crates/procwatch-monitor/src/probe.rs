//! Capability interfaces implemented by the embedding environment.

use async_trait::async_trait;
use thiserror::Error;

use procwatch_core::{ForegroundSample, ProcessSample, WatchTarget};

/// A sampling call failed inside the OS binding.
#[derive(Debug, Clone, Error)]
#[error("probe error: {message}")]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// OS-specific sampling capability. Any conforming implementation — a real
/// OS binding or a test fake — is interchangeable without touching the
/// engine.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Sample resource usage for the given targets, one result per target.
    async fn sample_processes(
        &self,
        targets: &[WatchTarget],
    ) -> Result<Vec<ProcessSample>, ProbeError>;

    /// Identity of the current foreground window, or `None` when no
    /// foreground is detected.
    async fn sample_foreground(&self) -> Result<Option<ForegroundSample>, ProbeError>;
}

/// Reports the monitor's own memory footprint. Obtained from the
/// environment, not from the [`Probe`]; `None` disables the watchdog.
pub trait SelfMemory: Send + Sync {
    fn usage_mb(&self) -> Option<f64>;
}
