//! Daemon lifecycle: wires the probe and the stdio channel into the engine.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use procwatch_core::DaemonConfig;
use procwatch_ipc::Channel;
use procwatch_monitor::{MonitorEngine, Probe, SelfMemory};

use crate::signals;
use crate::sys_probe::{SystemMemory, SystemProbe};

/// The main daemon process
pub struct Daemon {
    config: DaemonConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Sender that triggers a graceful shutdown when fired.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the monitor over stdin/stdout until the host closes the pipe or
    /// a shutdown signal arrives.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            sampling_interval_ms = self.config.monitor.sampling_interval_ms,
            foreground_interval_ms = self.config.monitor.foreground_interval_ms,
            max_snapshots = self.config.monitor.max_in_memory_snapshots,
            "daemon starting"
        );

        let probe: Arc<dyn Probe> = Arc::new(SystemProbe::new());
        let self_memory: Arc<dyn SelfMemory> = Arc::new(SystemMemory::new());

        let channel = Channel::spawn(tokio::io::stdin(), tokio::io::stdout());
        let engine = MonitorEngine::new(
            probe,
            channel.clone(),
            self.config.monitor.clone(),
            self_memory,
        );

        engine.start();

        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = signals::wait_for_shutdown(shutdown_rx) => {
                tracing::info!("shutdown signal received");
            }
            _ = channel.closed() => {
                tracing::info!("host closed the pipe");
            }
        }

        engine.stop();
        // The stopped event is queued; give the writer task a beat to drain.
        tokio::time::sleep(Duration::from_millis(50)).await;

        tracing::info!("daemon exiting");
        Ok(())
    }
}
