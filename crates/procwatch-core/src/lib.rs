//! procwatch core components
//!
//! This crate provides the domain types and building blocks for the procwatch
//! monitor: the watch-target registry, the bounded snapshot store, the
//! cancellable periodic scheduler, the self-memory budget, and configuration.

mod config;
mod error;
mod memory;
mod registry;
mod scheduler;
mod store;
mod types;

pub use config::{BreachPolicy, DaemonConfig, MonitorConfig};
pub use error::CoreError;
pub use memory::{MemoryBudget, MemoryPressure};
pub use registry::TargetRegistry;
pub use scheduler::Scheduler;
pub use store::SnapshotStore;
pub use types::{ForegroundSample, ProcessSample, SampleStatus, Snapshot, WatchTarget};
