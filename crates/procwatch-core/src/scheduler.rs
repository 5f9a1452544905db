//! Cancellable periodic-tick primitive with an overlap guard.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs a tick function on a fixed period until cancelled.
///
/// The tick future is awaited inline inside the timer task, so at most one
/// invocation is ever in flight; combined with [`MissedTickBehavior::Skip`],
/// firings that come due while a slow tick is still running are dropped, not
/// queued. Tick errors are caught and logged, and never stop the timer.
///
/// `cancel()` stops future firings. A tick already in flight runs to
/// completion; callers that must not apply late results check their own
/// running flag after the tick's await points.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn a scheduler firing `tick` every `period`, starting one period
    /// from now.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        // tokio rejects a zero interval; a zero config means "as fast as
        // possible", not "never".
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // A tokio interval fires immediately; consume that so the first
            // tick lands one full period after arming.
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        tracing::debug!(scheduler = name, "cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = tick().await {
                            tracing::warn!(scheduler = name, error = %e, "tick failed");
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop future firings. Idempotent.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_ticks_repeatedly_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let count = count.clone();
            Scheduler::spawn("test", Duration::from_millis(10), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        sleep(Duration::from_millis(100)).await;
        scheduler.cancel();
        let at_cancel = count.load(Ordering::SeqCst);
        assert!(at_cancel >= 3, "expected several ticks, got {at_cancel}");

        sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_cancel, "ticked after cancel");
    }

    #[tokio::test]
    async fn test_overlap_is_skipped_not_queued() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            let count = count.clone();
            Scheduler::spawn("slow", Duration::from_millis(10), move || {
                let in_flight = in_flight.clone();
                let max_in_flight = max_in_flight.clone();
                let count = count.clone();
                async move {
                    let active = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(active, Ordering::SeqCst);
                    count.fetch_add(1, Ordering::SeqCst);
                    // Slower than the period: due firings must be dropped.
                    sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        sleep(Duration::from_millis(250)).await;
        scheduler.cancel();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        // 250ms at a 10ms period would be ~25 firings if queued; with the
        // overlap guard each ~50ms tick drops the firings it straddles.
        let total = count.load(Ordering::SeqCst);
        assert!(total <= 6, "expected dropped firings, got {total} ticks");
    }

    #[tokio::test]
    async fn test_tick_error_does_not_stop_the_timer() {
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let count = count.clone();
            Scheduler::spawn("failing", Duration::from_millis(10), move || {
                let count = count.clone();
                async move {
                    let n = count.fetch_add(1, Ordering::SeqCst);
                    if n % 2 == 0 {
                        anyhow::bail!("simulated failure");
                    }
                    Ok(())
                }
            })
        };

        sleep(Duration::from_millis(100)).await;
        scheduler.cancel();

        assert!(count.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_in_flight_tick_finishes_after_cancel() {
        let finished = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let finished = finished.clone();
            Scheduler::spawn("draining", Duration::from_millis(10), move || {
                let finished = finished.clone();
                async move {
                    sleep(Duration::from_millis(40)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        // Cancel while the first tick is mid-flight.
        sleep(Duration::from_millis(25)).await;
        scheduler.cancel();
        sleep(Duration::from_millis(60)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_period_still_ticks() {
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let count = count.clone();
            Scheduler::spawn("hot", Duration::from_millis(0), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        sleep(Duration::from_millis(50)).await;
        scheduler.cancel();

        assert!(count.load(Ordering::SeqCst) >= 1, "zero period never fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_firing_does_not_beat_cancel() {
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler = {
            let count = count.clone();
            Scheduler::spawn("racing", Duration::from_millis(10), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(25)).await;
                    Ok(())
                }
            })
        };

        // Cancel while the first tick is in flight; by the time it finishes,
        // another firing is already due and must lose to the shutdown arm.
        sleep(Duration::from_millis(15)).await;
        scheduler.cancel();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let scheduler = Scheduler::spawn("idle", Duration::from_millis(10), || async { Ok(()) });
        scheduler.cancel();
        scheduler.cancel();
    }
}
