//! Expected phase durations.
//!
//! The table is total over `TaskType x TaskPhase`: the built-in values come
//! from an exhaustive match and tables built from explicit entries are
//! checked for completeness at construction.

use crate::error::{TaskError, TaskResult};
use relay_core::{TaskPhase, TaskType};
use std::collections::HashMap;
use std::time::Duration;

const TYPES: usize = TaskType::ALL.len();
const PHASES: usize = TaskPhase::ALL.len();

/// Expected duration in milliseconds per task type and phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyTable {
    ms: [[u64; PHASES]; TYPES],
}

impl LatencyTable {
    /// Build from explicit entries. Every pair must be present.
    pub fn from_entries(entries: &HashMap<TaskType, HashMap<TaskPhase, u64>>) -> TaskResult<Self> {
        let mut ms = [[0; PHASES]; TYPES];
        for task_type in TaskType::ALL {
            for phase in TaskPhase::ALL {
                ms[task_type.index()][phase.index()] = entries
                    .get(&task_type)
                    .and_then(|phases| phases.get(&phase))
                    .copied()
                    .ok_or(TaskError::MissingLatency { task_type, phase })?;
            }
        }
        Ok(Self { ms })
    }

    /// Built-in table with `overrides` applied on top.
    pub fn with_overrides(overrides: &HashMap<TaskType, HashMap<TaskPhase, u64>>) -> Self {
        let mut table = Self::default();
        for (task_type, phases) in overrides {
            for (phase, ms) in phases {
                table.ms[task_type.index()][phase.index()] = *ms;
            }
        }
        table
    }

    pub fn millis(&self, task_type: TaskType, phase: TaskPhase) -> u64 {
        self.ms[task_type.index()][phase.index()]
    }

    pub fn get(&self, task_type: TaskType, phase: TaskPhase) -> Duration {
        Duration::from_millis(self.millis(task_type, phase))
    }
}

impl Default for LatencyTable {
    fn default() -> Self {
        let mut ms = [[0; PHASES]; TYPES];
        for task_type in TaskType::ALL {
            for phase in TaskPhase::ALL {
                ms[task_type.index()][phase.index()] = builtin_ms(task_type, phase);
            }
        }
        Self { ms }
    }
}

fn builtin_ms(task_type: TaskType, phase: TaskPhase) -> u64 {
    use TaskPhase::*;
    use TaskType::*;

    match (task_type, phase) {
        (_, Completed) => 0,

        (InitializeAccount, Proving) => 41_000,
        (InitializeAccount, SubmittingTx) => 4_000,
        (InitializeAccount, FindingOpening) => 4_000,
        (InitializeAccount, UpdatingValidityProofs) => 0,

        (Deposit | Withdrawal, Proving) => 22_000,
        (Deposit | Withdrawal, SubmittingTx) => 1_000,
        (Deposit | Withdrawal, FindingOpening) => 1_000,
        (Deposit | Withdrawal, UpdatingValidityProofs) => 48_000,

        (PlaceOrder | ModifyOrder | CancelOrder, Proving) => 22_000,
        (PlaceOrder | ModifyOrder | CancelOrder, SubmittingTx) => 1_000,
        (PlaceOrder | ModifyOrder | CancelOrder, FindingOpening) => 0,
        (PlaceOrder | ModifyOrder | CancelOrder, UpdatingValidityProofs) => 48_000,

        (ApproveFee | ModifyFee | RevokeFee, _) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entries(ms: u64) -> HashMap<TaskType, HashMap<TaskPhase, u64>> {
        TaskType::ALL
            .into_iter()
            .map(|t| (t, TaskPhase::ALL.into_iter().map(|p| (p, ms)).collect()))
            .collect()
    }

    #[test]
    fn test_builtin_values() {
        let table = LatencyTable::default();
        assert_eq!(table.millis(TaskType::InitializeAccount, TaskPhase::Proving), 41_000);
        assert_eq!(table.millis(TaskType::Deposit, TaskPhase::UpdatingValidityProofs), 48_000);
        assert_eq!(table.millis(TaskType::PlaceOrder, TaskPhase::FindingOpening), 0);
        assert_eq!(table.millis(TaskType::RevokeFee, TaskPhase::Proving), 0);
        for t in TaskType::ALL {
            assert_eq!(table.millis(t, TaskPhase::Completed), 0);
        }
    }

    #[test]
    fn test_from_entries_requires_every_pair() {
        let mut entries = full_entries(1_000);
        assert!(LatencyTable::from_entries(&entries).is_ok());

        entries
            .get_mut(&TaskType::Withdrawal)
            .unwrap()
            .remove(&TaskPhase::SubmittingTx);
        let err = LatencyTable::from_entries(&entries).unwrap_err();
        assert!(matches!(
            err,
            TaskError::MissingLatency {
                task_type: TaskType::Withdrawal,
                phase: TaskPhase::SubmittingTx
            }
        ));
    }

    #[test]
    fn test_overrides_merge_over_builtin() {
        let overrides =
            HashMap::from([(TaskType::Deposit, HashMap::from([(TaskPhase::Proving, 30_000)]))]);
        let table = LatencyTable::with_overrides(&overrides);

        assert_eq!(table.millis(TaskType::Deposit, TaskPhase::Proving), 30_000);
        assert_eq!(table.millis(TaskType::Withdrawal, TaskPhase::Proving), 22_000);
        assert_eq!(table.get(TaskType::Deposit, TaskPhase::Proving), Duration::from_secs(30));
    }
}
