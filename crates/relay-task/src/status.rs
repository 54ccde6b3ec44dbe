//! Task status source.

use parking_lot::RwLock;
use relay_core::{TaskPhase, TaskStatus, TaskType};
use tracing::debug;

/// Exposes the latest task type and phase synchronously.
pub trait TaskStatusSource: Send + Sync {
    fn current(&self) -> TaskStatus;
}

/// Task status written by whoever receives relayer task updates.
#[derive(Debug, Default)]
pub struct TaskStatusCell {
    status: RwLock<TaskStatus>,
}

impl TaskStatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: TaskStatus) {
        let mut current = self.status.write();
        if *current != status {
            debug!(
                task_type = ?status.task_type,
                phase = ?status.phase,
                "Task status changed"
            );
            *current = status;
        }
    }

    pub fn set_task_type(&self, task_type: Option<TaskType>) {
        let phase = self.status.read().phase;
        self.set(TaskStatus { task_type, phase });
    }

    pub fn set_phase(&self, phase: Option<TaskPhase>) {
        let task_type = self.status.read().task_type;
        self.set(TaskStatus { task_type, phase });
    }

    pub fn clear(&self) {
        self.set(TaskStatus::idle());
    }
}

impl TaskStatusSource for TaskStatusCell {
    fn current(&self) -> TaskStatus {
        *self.status.read()
    }
}
