//! sysinfo-backed implementations of the sampling capabilities.

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

use procwatch_core::{ForegroundSample, ProcessSample, WatchTarget};
use procwatch_monitor::{Probe, ProbeError, SelfMemory};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Samples watched processes from the OS process table.
///
/// CPU usage is measured between successive refreshes, so the first sample
/// for a target reads 0%.
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SystemProbe {
    async fn sample_processes(
        &self,
        targets: &[WatchTarget],
    ) -> Result<Vec<ProcessSample>, ProbeError> {
        let mut sys = self.system.lock();

        let pids: Vec<Pid> = targets
            .iter()
            .filter_map(|t| target_pid(t).map(Pid::from_u32))
            .collect();
        sys.refresh_processes(ProcessesToUpdate::Some(&pids), true);

        Ok(targets.iter().map(|t| sample_target(&sys, t)).collect())
    }

    async fn sample_foreground(&self) -> Result<Option<ForegroundSample>, ProbeError> {
        // Foreground-window detection needs a GUI binding; hosts that have
        // one inject their own probe. The stock daemon reports absence.
        Ok(None)
    }
}

fn target_pid(target: &WatchTarget) -> Option<u32> {
    if target.kind != "pid" {
        return None;
    }
    target.id.parse().ok()
}

fn sample_target(sys: &System, target: &WatchTarget) -> ProcessSample {
    let Some(pid) = target_pid(target) else {
        return ProcessSample::error(target.key());
    };

    match sys.process(Pid::from_u32(pid)) {
        Some(process) => ProcessSample::running(
            target.key(),
            process.cpu_usage(),
            process.memory() as f64 / BYTES_PER_MB,
        ),
        None => ProcessSample::not_found(target.key()),
    }
}

/// Reports the daemon's own resident memory for the watchdog.
pub struct SystemMemory {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SystemMemory {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            tracing::warn!("cannot determine own pid, memory watchdog disabled");
        }
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SelfMemory for SystemMemory {
    fn usage_mb(&self) -> Option<f64> {
        let pid = self.pid?;
        let mut sys = self.system.lock();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid)
            .map(|p| p.memory() as f64 / BYTES_PER_MB)
    }
}
