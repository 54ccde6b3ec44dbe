//! Progress estimation configuration.

use std::time::Duration;

/// Timing knobs for the estimator and its poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Re-evaluation interval.
    pub poll_interval: Duration,
    /// Phases with a shorter table duration do not move the anchor.
    pub min_display: Duration,
    /// How long the estimate stays visible after the task ends.
    pub linger: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            min_display: Duration::from_millis(5000),
            linger: Duration::from_millis(5000),
        }
    }
}
