//! Background eviction of expired attempt entries.
//!
//! Identifiers that fail once or twice and never come back would otherwise
//! stay in memory until they are touched again. The sweeper bounds that by
//! running [`LoginRateLimiter::cleanup`] on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::limiter::LoginRateLimiter;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic cleanup task for a [`LoginRateLimiter`].
pub struct Sweeper;

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// The first sweep happens one `interval` after spawning.
    pub fn spawn(limiter: Arc<LoginRateLimiter>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(limiter, interval, shutdown_rx));

        SweeperHandle {
            shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running sweeper.
///
/// Dropping the handle stops the sweeper without waiting for it.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }
    }

    /// Whether the sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run(
    limiter: Arc<LoginRateLimiter>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "Sweeper started");

    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Skip the immediate tick
    timer.tick().await;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let removed = limiter.cleanup();
                if removed > 0 {
                    debug!(
                        removed = removed,
                        remaining = limiter.tracked_count(),
                        "Evicted expired attempt entries"
                    );
                }
            }
            changed = shutdown_rx.changed() => {
                // A closed channel means the handle is gone.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Sweeper stopped");
}
