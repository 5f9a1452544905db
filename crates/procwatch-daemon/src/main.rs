//! procwatch daemon
//!
//! Spawned by a host process; speaks newline-delimited JSON over
//! stdin/stdout and samples the watched processes with sysinfo.

mod daemon;
mod signals;
mod sys_probe;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use procwatch_core::DaemonConfig;

pub use daemon::Daemon;

#[derive(Parser)]
#[command(
    name = "procwatch-daemon",
    about = "Process monitoring daemon speaking newline-delimited JSON over stdio",
    version
)]
struct Args {
    /// Path to a YAML config file (default: ~/.procwatch/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path)?,
        None => DaemonConfig::load(),
    };
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("starting procwatch daemon v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(Daemon::new(config).run())
}
