//! Background eviction of expired store entries.
//!
//! Runs beside the admission path, never inside it. Evicting an entry changes no
//! verdict: an evicted rate entry had nothing left in its window, and an evicted
//! quota counter was dated before today.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::admission::Admission;
use crate::clock::Clock;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running sweeper. Dropping it stops the task.
pub struct SweeperHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish its current pass.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Sweep `admission` every `every`. A zero period is raised to one millisecond.
pub fn spawn_sweeper(
    admission: Admission,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> SweeperHandle {
    let every = every.max(MIN_PERIOD);
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;

        tracing::debug!(interval_ms = every.as_millis() as u64, "Sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = admission.sweep(clock.now());
                    if stats.rate_entries + stats.quota_entries > 0 {
                        tracing::debug!(
                            rate_entries = stats.rate_entries,
                            quota_entries = stats.quota_entries,
                            "Swept expired clients"
                        );
                    }
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Sweeper stopped");
    });

    SweeperHandle {
        stop,
        task: Some(task),
    }
}
