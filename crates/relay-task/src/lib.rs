//! Task progress estimation.
//!
//! Relayer tasks report only their current type and phase. Progress is
//! estimated from a static per-phase latency table:
//! - `LatencyTable`: total mapping `(TaskType, TaskPhase) -> ms`
//! - `ProgressEstimator`: phase anchoring and percentage derivation
//! - `VisibilityTracker`: hide with a linger after the task ends
//! - `ProgressPoller`: cancellable fixed-interval evaluation

pub mod config;
pub mod error;
pub mod estimator;
pub mod latency;
pub mod poller;
pub mod status;

pub use config::ProgressConfig;
pub use error::{TaskError, TaskResult};
pub use estimator::{ProgressEstimate, ProgressEstimator, Visibility, VisibilityTracker};
pub use latency::LatencyTable;
pub use poller::{LocalOrderCount, ProgressPoller, ProgressSnapshot};
pub use status::{TaskStatusCell, TaskStatusSource};
