//! The monitor engine: lifecycle, sampling ticks, and the memory watchdog.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use procwatch_core::{
    BreachPolicy, ForegroundSample, MemoryBudget, MemoryPressure, MonitorConfig, Scheduler,
    Snapshot, SnapshotStore, TargetRegistry, WatchTarget,
};
use procwatch_ipc::Channel;

use crate::commands::EngineCommands;
use crate::probe::{Probe, ProbeError, SelfMemory};

/// Mutable engine state. Every mutation is a single synchronous step under
/// the lock, never held across an await, so scheduler ticks and command
/// handlers can never observe a half-applied change.
struct EngineState {
    registry: TargetRegistry,
    store: SnapshotStore,
    last_foreground: Option<ForegroundSample>,
}

struct Schedulers {
    process: Scheduler,
    foreground: Scheduler,
}

struct EngineInner {
    probe: Arc<dyn Probe>,
    channel: Channel,
    config: MonitorConfig,
    budget: MemoryBudget,
    self_memory: Arc<dyn SelfMemory>,
    state: Mutex<EngineState>,
    running: AtomicBool,
    schedulers: Mutex<Option<Schedulers>>,
    started_at: Mutex<Option<Instant>>,
}

/// One monitoring session. Each instance owns its registry, store, timers,
/// and foreground state; independent instances do not interfere.
///
/// Cheaply cloneable handle; the schedulers and the command handler hold
/// only weak references, so dropping the last `MonitorEngine` tears the
/// session down.
#[derive(Clone)]
pub struct MonitorEngine {
    inner: Arc<EngineInner>,
}

/// Weak engine handle used by schedulers and command dispatch.
#[derive(Clone)]
pub(crate) struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    pub(crate) fn upgrade(&self) -> Option<MonitorEngine> {
        self.inner.upgrade().map(|inner| MonitorEngine { inner })
    }
}

impl MonitorEngine {
    /// Create an engine and register its command dispatch on the channel.
    pub fn new(
        probe: Arc<dyn Probe>,
        channel: Channel,
        config: MonitorConfig,
        self_memory: Arc<dyn SelfMemory>,
    ) -> Self {
        let budget = MemoryBudget::new(config.max_memory_mb_self);
        let store = SnapshotStore::new(config.max_in_memory_snapshots);

        let engine = Self {
            inner: Arc::new(EngineInner {
                probe,
                channel: channel.clone(),
                config,
                budget,
                self_memory,
                state: Mutex::new(EngineState {
                    registry: TargetRegistry::new(),
                    store,
                    last_foreground: None,
                }),
                running: AtomicBool::new(false),
                schedulers: Mutex::new(None),
                started_at: Mutex::new(None),
            }),
        };

        channel.bind(Arc::new(EngineCommands::new(engine.downgrade())));
        engine
    }

    pub(crate) fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Arm both sampling schedulers. No-op when already started.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.started_at.lock() = Some(Instant::now());

        let process = {
            let engine = self.downgrade();
            Scheduler::spawn(
                "process-sampling",
                Duration::from_millis(self.inner.config.sampling_interval_ms),
                move || {
                    let engine = engine.clone();
                    async move {
                        match engine.upgrade() {
                            Some(engine) => engine.process_tick().await,
                            None => Ok(()),
                        }
                    }
                },
            )
        };

        let foreground = {
            let engine = self.downgrade();
            Scheduler::spawn(
                "foreground-sampling",
                Duration::from_millis(self.inner.config.foreground_interval_ms),
                move || {
                    let engine = engine.clone();
                    async move {
                        match engine.upgrade() {
                            Some(engine) => engine.foreground_tick().await,
                            None => Ok(()),
                        }
                    }
                },
            )
        };

        *self.inner.schedulers.lock() = Some(Schedulers {
            process,
            foreground,
        });

        tracing::info!(
            sampling_interval_ms = self.inner.config.sampling_interval_ms,
            foreground_interval_ms = self.inner.config.foreground_interval_ms,
            "monitor started"
        );
        self.inner.channel.send_event("monitor:started", json!({}));
    }

    /// Disarm both schedulers. No-op when already stopped. An in-flight
    /// tick finishes but its result is discarded.
    pub fn stop(&self) {
        self.stop_with_reason(None);
    }

    fn stop_with_reason(&self, reason: Option<&str>) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(schedulers) = self.inner.schedulers.lock().take() {
            schedulers.process.cancel();
            schedulers.foreground.cancel();
        }

        tracing::info!(reason = reason.unwrap_or("requested"), "monitor stopped");
        let payload = match reason {
            Some(reason) => json!({ "reason": reason }),
            None => json!({}),
        };
        self.inner.channel.send_event("monitor:stopped", payload);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Add a target to the registry, effective from the next due tick.
    /// Returns false when the key was already watched.
    pub fn add_watch_target(&self, kind: impl Into<String>, id: impl Into<String>) -> bool {
        self.add_target(WatchTarget::new(kind, id))
    }

    pub fn add_target(&self, target: WatchTarget) -> bool {
        let added = self.inner.state.lock().registry.add(target.clone());
        if added {
            tracing::debug!(target = %target.key(), "watch target added");
        }
        added
    }

    /// Remove a target. Returns false when the key was unknown.
    pub fn remove_watch_target(&self, kind: &str, id: &str) -> bool {
        let removed = self.inner.state.lock().registry.remove(kind, id);
        if removed {
            tracing::debug!(target = %format!("{kind}:{id}"), "watch target removed");
        }
        removed
    }

    /// Ordered copy of the current watch targets.
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.inner.state.lock().registry.targets()
    }

    /// Immutable view of the snapshot history, oldest to newest.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.state.lock().store.all()
    }

    pub fn target_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner
            .started_at
            .lock()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// One process-sampling tick: probe the registered targets, record a
    /// snapshot, emit the sample event, then let the watchdog look at our
    /// own footprint.
    async fn process_tick(&self) -> anyhow::Result<()> {
        let targets = self.inner.state.lock().registry.targets();

        let samples = match self.inner.probe.sample_processes(&targets).await {
            Ok(samples) => samples,
            Err(e) => {
                self.report_probe_error("process", &e);
                return Err(e.into());
            }
        };

        // Stopped while the probe was in flight: discard the result.
        if !self.is_running() {
            return Ok(());
        }

        let snapshot = Snapshot::now(samples);
        self.inner.state.lock().store.push(snapshot.clone());
        self.inner
            .channel
            .send_event("process:sample", json!({ "snapshot": snapshot }));

        self.check_memory();
        Ok(())
    }

    /// One foreground-sampling tick: emit `foreground:changed` only on a
    /// true transition, compared by full structural equality.
    async fn foreground_tick(&self) -> anyhow::Result<()> {
        let sample = match self.inner.probe.sample_foreground().await {
            Ok(sample) => sample,
            Err(e) => {
                self.report_probe_error("foreground", &e);
                return Err(e.into());
            }
        };

        if !self.is_running() {
            return Ok(());
        }

        let changed = {
            let mut state = self.inner.state.lock();
            if state.last_foreground == sample {
                false
            } else {
                state.last_foreground = sample.clone();
                true
            }
        };

        if changed {
            self.inner
                .channel
                .send_event("foreground:changed", json!({ "sample": sample }));
        }
        Ok(())
    }

    fn report_probe_error(&self, kind: &str, error: &ProbeError) {
        self.inner.channel.send_event(
            "monitor:probe-error",
            json!({ "kind": kind, "message": error.to_string() }),
        );
    }

    /// Memory watchdog, piggybacked on the process-sampling tick.
    fn check_memory(&self) {
        let Some(usage_mb) = self.inner.self_memory.usage_mb() else {
            return;
        };

        match self.inner.budget.pressure(usage_mb) {
            MemoryPressure::Normal => {}
            MemoryPressure::Warning => {
                tracing::debug!(usage_mb, limit_mb = self.inner.budget.limit_mb(), "self memory nearing budget");
            }
            MemoryPressure::Breach => {
                let keep = (self.inner.config.max_in_memory_snapshots / 2).max(1);
                self.inner.state.lock().store.trim_to(keep);
                tracing::warn!(
                    usage_mb,
                    limit_mb = self.inner.budget.limit_mb(),
                    kept_snapshots = keep,
                    "self memory over budget, trimmed history"
                );
                self.inner
                    .channel
                    .send_event("monitor:memory-warning", json!({ "usageMb": usage_mb }));

                if self.inner.config.on_memory_breach == BreachPolicy::TrimAndStop {
                    self.stop_with_reason(Some("memory-limit"));
                }
            }
        }
    }
}
