//! Progress estimation for the active relayer task.
//!
//! The estimate is anchored at the time the current phase was entered. Phases
//! expected to be shorter than `min_display` do not move the anchor, so the
//! ring keeps running on the previous phase's timer instead of flickering
//! through phases too fast to read.

use crate::latency::LatencyTable;
use relay_core::{TaskPhase, TaskStatus, TaskType};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Progress as rendered next to the task labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressEstimate {
    pub task_type: Option<TaskType>,
    pub phase: Option<TaskPhase>,
    /// Estimated completion in `[0, 100]`.
    pub percent: u8,
    /// Estimate exhausted before the task completed; show a spinner.
    pub indeterminate: bool,
}

impl ProgressEstimate {
    /// Numeral shown inside the ring. Never 100 while the task is still
    /// running.
    pub fn displayed_percent(&self) -> u8 {
        if self.indeterminate {
            99
        } else {
            self.percent
        }
    }

    /// Whether the estimate is rendered at all.
    pub fn is_displayed(&self) -> bool {
        self.task_type.is_some() && self.phase.is_some_and(|p| !p.is_completed())
    }

    pub fn task_label(&self) -> Option<&'static str> {
        self.task_type.map(|t| t.label())
    }

    pub fn phase_label(&self) -> Option<&'static str> {
        self.phase.map(|p| p.label())
    }
}

/// Stateful estimator; feed it the latest task status on every poll.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    table: LatencyTable,
    min_display: Duration,
    /// Last pair that moved the anchor.
    previous: Option<(TaskType, TaskPhase)>,
    anchor: Option<Instant>,
}

impl ProgressEstimator {
    pub fn new(table: LatencyTable, min_display: Duration) -> Self {
        Self {
            table,
            min_display,
            previous: None,
            anchor: None,
        }
    }

    pub fn table(&self) -> &LatencyTable {
        &self.table
    }

    pub fn anchor(&self) -> Option<Instant> {
        self.anchor
    }

    pub fn previous(&self) -> Option<(TaskType, TaskPhase)> {
        self.previous
    }

    /// Record `status` at `now`. Returns whether the anchor moved.
    pub fn observe(&mut self, status: TaskStatus, now: Instant) -> bool {
        let Some(pair) = status.pair() else {
            return false;
        };
        if self.previous == Some(pair) {
            return false;
        }

        let (task_type, phase) = pair;
        let next = self.table.get(task_type, phase);
        if next < self.min_display {
            return false;
        }

        debug!(
            task_type = %task_type,
            phase = %phase,
            expected_ms = next.as_millis() as u64,
            "Task phase anchored"
        );
        self.anchor = Some(now);
        self.previous = Some(pair);
        true
    }

    /// Estimate progress of `status` at `now`, given the number of orders
    /// managed by the connected relayer.
    pub fn estimate(&self, status: TaskStatus, local_orders: usize, now: Instant) -> ProgressEstimate {
        let mut percent = match (status.pair(), self.anchor) {
            (Some((task_type, phase)), Some(anchor)) => {
                let expected = self.table.millis(task_type, phase);
                let elapsed = now.saturating_duration_since(anchor).as_millis();
                ratio_percent(elapsed, expected)
            }
            _ => 0,
        };

        if status.phase == Some(TaskPhase::Completed) {
            percent = 100;
        }
        // Nothing to re-prove; the phase finishes immediately.
        if status.phase == Some(TaskPhase::UpdatingValidityProofs) && local_orders == 0 {
            percent = 100;
        }

        ProgressEstimate {
            task_type: status.task_type,
            phase: status.phase,
            percent,
            indeterminate: percent == 100 && status.phase != Some(TaskPhase::Completed),
        }
    }

    /// `observe` then `estimate`.
    pub fn tick(&mut self, status: TaskStatus, local_orders: usize, now: Instant) -> ProgressEstimate {
        self.observe(status, now);
        self.estimate(status, local_orders, now)
    }
}

/// `ceil(100 * elapsed / expected)` clamped to 100. A zero expectation is
/// already exhausted.
fn ratio_percent(elapsed_ms: u128, expected_ms: u64) -> u8 {
    if expected_ms == 0 {
        return 100;
    }
    let expected = u128::from(expected_ms);
    let pct = (elapsed_ms * 100).div_ceil(expected);
    pct.min(100) as u8
}

/// Whether the estimate is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Shown,
    /// Task ended; still on screen until the linger expires.
    Lingering,
    Hidden,
}

/// Delays hiding the estimate after the task ends.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    linger: Duration,
    shown: bool,
    hidden_since: Option<Instant>,
}

impl VisibilityTracker {
    pub fn new(linger: Duration) -> Self {
        Self {
            linger,
            shown: false,
            hidden_since: None,
        }
    }

    pub fn update(&mut self, displayed: bool, now: Instant) -> Visibility {
        if displayed {
            self.shown = true;
            self.hidden_since = None;
            return Visibility::Shown;
        }
        if !self.shown {
            return Visibility::Hidden;
        }

        let since = *self.hidden_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.linger {
            Visibility::Lingering
        } else {
            self.shown = false;
            self.hidden_since = None;
            Visibility::Hidden
        }
    }
}
