//! Fixed-interval progress evaluation.
//!
//! Progress must advance with wall-clock time even when no task events
//! arrive, so the estimator is re-evaluated on a timer. The timer task is
//! owned by the poller and stops on `stop` or drop.

use crate::config::ProgressConfig;
use crate::estimator::{ProgressEstimate, ProgressEstimator, Visibility, VisibilityTracker};
use crate::latency::LatencyTable;
use crate::status::TaskStatusSource;
use relay_telemetry::Metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Number of orders managed by the connected relayer.
pub type LocalOrderCount = Arc<dyn Fn() -> usize + Send + Sync>;

/// Latest evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub estimate: ProgressEstimate,
    pub visibility: Visibility,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            estimate: ProgressEstimate::default(),
            visibility: Visibility::Hidden,
        }
    }
}

/// Owns the polling task.
pub struct ProgressPoller {
    shutdown: CancellationToken,
    rx: watch::Receiver<ProgressSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressPoller {
    /// Start polling `status` on the current runtime.
    pub fn spawn(
        config: ProgressConfig,
        table: LatencyTable,
        status: Arc<dyn TaskStatusSource>,
        local_orders: LocalOrderCount,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (tx, rx) = watch::channel(ProgressSnapshot::default());

        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut estimator = ProgressEstimator::new(table, config.min_display);
            let mut visibility = VisibilityTracker::new(config.linger);
            let mut interval = tokio::time::interval(config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!("Progress poller stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let estimate = estimator.tick(status.current(), local_orders(), now);
                        let snapshot = ProgressSnapshot {
                            estimate,
                            visibility: visibility.update(estimate.is_displayed(), now),
                        };
                        if let Some(task_type) = estimate.task_type {
                            Metrics::task_progress(task_type.as_str(), estimate.percent);
                        }
                        tx.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                *current = snapshot;
                                true
                            }
                        });
                    }
                }
            }
        });

        info!(
            interval_ms = config.poll_interval.as_millis() as u64,
            "Progress poller started"
        );
        Self {
            shutdown,
            rx,
            handle: Some(handle),
        }
    }

    /// Latest snapshot.
    pub fn current(&self) -> ProgressSnapshot {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling and wait for the task to exit. Idempotent.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
