//! Relayer task identification.
//!
//! A task is a long-running operation (account creation, deposit, order
//! placement, ...) that the relayer executes as a sequence of phases.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of relayer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskType {
    InitializeAccount,
    Deposit,
    Withdrawal,
    PlaceOrder,
    ModifyOrder,
    CancelOrder,
    ApproveFee,
    ModifyFee,
    RevokeFee,
}

impl TaskType {
    pub const ALL: [TaskType; 9] = [
        Self::InitializeAccount,
        Self::Deposit,
        Self::Withdrawal,
        Self::PlaceOrder,
        Self::ModifyOrder,
        Self::CancelOrder,
        Self::ApproveFee,
        Self::ModifyFee,
        Self::RevokeFee,
    ];

    /// Dense index, stable across releases.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitializeAccount => "InitializeAccount",
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdrawal",
            Self::PlaceOrder => "PlaceOrder",
            Self::ModifyOrder => "ModifyOrder",
            Self::CancelOrder => "CancelOrder",
            Self::ApproveFee => "ApproveFee",
            Self::ModifyFee => "ModifyFee",
            Self::RevokeFee => "RevokeFee",
        }
    }

    /// Human-readable label shown next to the progress ring.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitializeAccount => "Creating a New Account",
            Self::Deposit => "Depositing Tokens",
            Self::Withdrawal => "Withdrawing Tokens",
            Self::PlaceOrder => "Placing Order",
            Self::ModifyOrder => "Modifying Order",
            Self::CancelOrder => "Cancelling Order",
            Self::ApproveFee => "Approving Fee",
            Self::ModifyFee => "Modifying Fee",
            Self::RevokeFee => "Revoking Fee",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTaskType(s.to_string()))
    }
}

/// Phase of a relayer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPhase {
    Proving,
    SubmittingTx,
    /// Account creation reports this phase as `FindingMerkleOpening`.
    #[serde(alias = "FindingMerkleOpening")]
    FindingOpening,
    UpdatingValidityProofs,
    Completed,
}

impl TaskPhase {
    pub const ALL: [TaskPhase; 5] = [
        Self::Proving,
        Self::SubmittingTx,
        Self::FindingOpening,
        Self::UpdatingValidityProofs,
        Self::Completed,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proving => "Proving",
            Self::SubmittingTx => "SubmittingTx",
            Self::FindingOpening => "FindingOpening",
            Self::UpdatingValidityProofs => "UpdatingValidityProofs",
            Self::Completed => "Completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Proving => "Generating ZK Proof",
            Self::SubmittingTx => "Submitting Transaction",
            Self::FindingOpening => "Finding New Merkle Opening",
            Self::UpdatingValidityProofs => "Updating Validity Proofs",
            Self::Completed => "Completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "FindingMerkleOpening" {
            return Ok(Self::FindingOpening);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTaskPhase(s.to_string()))
    }
}

/// Latest task type and phase reported for the active account.
///
/// Either half may be absent (no task running, or the relayer has not yet
/// reported a phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_type: Option<TaskType>,
    pub phase: Option<TaskPhase>,
}

impl TaskStatus {
    pub fn new(task_type: TaskType, phase: TaskPhase) -> Self {
        Self {
            task_type: Some(task_type),
            phase: Some(phase),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    /// Both halves, if both are known.
    pub fn pair(&self) -> Option<(TaskType, TaskPhase)> {
        self.task_type.zip(self.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, t) in TaskType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
        for (i, p) in TaskPhase::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn test_merkle_opening_alias() {
        let phase: TaskPhase = serde_json::from_str("\"FindingMerkleOpening\"").unwrap();
        assert_eq!(phase, TaskPhase::FindingOpening);
        assert_eq!(
            "FindingMerkleOpening".parse::<TaskPhase>().unwrap(),
            TaskPhase::FindingOpening
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(TaskType::Deposit.label(), "Depositing Tokens");
        assert_eq!(TaskType::InitializeAccount.label(), "Creating a New Account");
        assert_eq!(TaskPhase::Proving.label(), "Generating ZK Proof");
        assert_eq!(TaskPhase::FindingOpening.label(), "Finding New Merkle Opening");
    }

    #[test]
    fn test_parse_unknown() {
        assert!("Bridge".parse::<TaskType>().is_err());
        assert!("Waiting".parse::<TaskPhase>().is_err());
    }

    #[test]
    fn test_status_pair() {
        assert_eq!(TaskStatus::idle().pair(), None);
        let partial = TaskStatus {
            task_type: Some(TaskType::Deposit),
            phase: None,
        };
        assert_eq!(partial.pair(), None);
        assert_eq!(
            TaskStatus::new(TaskType::Deposit, TaskPhase::Proving).pair(),
            Some((TaskType::Deposit, TaskPhase::Proving))
        );
    }
}
