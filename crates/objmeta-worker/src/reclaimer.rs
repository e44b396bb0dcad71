//! Orphan folder reclaimer: deletes folders with no files on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use objmeta_core::traits::OrphanSweeper;

/// Periodic best-effort sweep of unreferenced folders.
///
/// The first sweep happens one full period after start. A failed sweep is
/// logged and the next one is still scheduled a period later.
pub struct OrphanReclaimer {
    sweeper: Arc<dyn OrphanSweeper>,
    interval: Duration,
}

impl std::fmt::Debug for OrphanReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrphanReclaimer")
            .field("interval", &self.interval)
            .finish()
    }
}

impl OrphanReclaimer {
    /// Create a reclaimer that sweeps through `sweeper` every `interval`.
    pub fn new(sweeper: Arc<dyn OrphanSweeper>, interval: Duration) -> Self {
        Self {
            sweeper,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// The sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until the cancel signal flips to `true` or its sender is dropped.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Orphan folder reclaimer started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!("Orphan folder reclaimer received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!("Orphan folder reclaimer stopped");
    }

    /// Run a single sweep. Returns the number of removed folders, or
    /// `None` when the sweep failed.
    pub async fn run_once(&self) -> Option<u64> {
        debug!("Reclaiming orphan folders");
        let started = Instant::now();

        match self.sweeper.remove_unreferenced_folders().await {
            Ok(removed) => {
                info!(
                    rows = removed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Orphan folder reclamation finished"
                );
                Some(removed)
            }
            Err(e) => {
                error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Orphan folder reclamation failed"
                );
                None
            }
        }
    }

    /// Move the reclaimer onto its own task.
    pub fn spawn(self) -> ReclaimerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(cancel_rx).await });
        ReclaimerHandle {
            cancel: cancel_tx,
            task,
        }
    }
}

/// Handle to a spawned reclaimer.
#[derive(Debug)]
pub struct ReclaimerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Signal the reclaimer to stop and wait for its task to finish.
    ///
    /// A sweep in flight is allowed to complete (it is bounded by its own
    /// deadline).
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Orphan folder reclaimer task failed");
        }
    }
}
