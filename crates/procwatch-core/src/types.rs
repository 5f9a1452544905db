//! Domain types shared between the monitor engine and the wire protocol.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifies a process to watch, e.g. `{kind: "pid", id: "1234"}`.
///
/// The `(kind, id)` pair is the registry key. On the wire the `id` may arrive
/// as a JSON string or number; it is normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchTarget {
    pub kind: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl WatchTarget {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for the common `pid` kind.
    pub fn pid(pid: u32) -> Self {
        Self::new("pid", pid.to_string())
    }

    /// Stable key referencing this target from samples.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Outcome of sampling a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStatus {
    Running,
    NotFound,
    Error,
}

/// One target's resource usage at a single sampling tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSample {
    /// `WatchTarget::key()` of the sampled target.
    pub target_id: String,
    /// CPU usage in percent.
    pub cpu: f32,
    /// Resident memory in megabytes.
    pub memory_mb: f64,
    pub status: SampleStatus,
}

impl ProcessSample {
    pub fn running(target_id: impl Into<String>, cpu: f32, memory_mb: f64) -> Self {
        Self {
            target_id: target_id.into(),
            cpu,
            memory_mb,
            status: SampleStatus::Running,
        }
    }

    pub fn not_found(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            cpu: 0.0,
            memory_mb: 0.0,
            status: SampleStatus::NotFound,
        }
    }

    pub fn error(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            cpu: 0.0,
            memory_mb: 0.0,
            status: SampleStatus::Error,
        }
    }
}

/// One timestamped batch of process samples. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    pub samples: Vec<ProcessSample>,
}

impl Snapshot {
    /// Wrap samples with the current wall-clock timestamp.
    pub fn now(samples: Vec<ProcessSample>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            samples,
        }
    }
}

/// The currently focused window's identity. Absence (`None` at the call
/// sites) means no foreground window was detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundSample {
    pub pid: u32,
    pub process_name: String,
    pub window_title: String,
}
