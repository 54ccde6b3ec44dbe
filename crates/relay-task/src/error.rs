//! Task error types.

use relay_core::{TaskPhase, TaskType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Latency table has no entry for {task_type}/{phase}")]
    MissingLatency { task_type: TaskType, phase: TaskPhase },
}

pub type TaskResult<T> = Result<T, TaskError>;
