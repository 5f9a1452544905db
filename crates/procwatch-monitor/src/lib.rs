//! procwatch monitor engine
//!
//! Orchestrates the two sampling schedulers, the target registry, the
//! snapshot store, the memory watchdog, and command dispatch over the
//! channel. OS-level sampling is delegated to an injected [`Probe`].

mod commands;
mod engine;
mod probe;

pub use commands::EngineCommands;
pub use engine::MonitorEngine;
pub use probe::{Probe, ProbeError, SelfMemory};
