//! Signal handling for graceful shutdown.

use tokio::sync::broadcast;

/// Wait for SIGINT, SIGTERM, or an explicit shutdown broadcast.
pub async fn wait_for_shutdown(mut shutdown_rx: broadcast::Receiver<()>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT");
        }
        _ = shutdown_rx.recv() => {
            tracing::info!("received shutdown request");
        }
        _ = wait_for_sigterm() => {
            tracing::info!("received SIGTERM");
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
