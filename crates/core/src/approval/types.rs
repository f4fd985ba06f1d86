//! Approval domain types.
//!
//! Status values, decisions, approver slots and the evaluation result
//! shared by the rule model, the ledger and the engine.

use chrono::{DateTime, Utc};
use expensa_shared::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Approval status of an expense.
///
/// The only valid transitions are:
/// - Pending → Approved
/// - Pending → Rejected
///
/// Approved and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    /// Waiting for one or more approvers.
    Pending,
    /// Approval condition met.
    Approved,
    /// Rejected by a required approver or threshold missed.
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Returns true if no further decision can change this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single approver's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The approver accepts the expense.
    #[serde(alias = "Approve", alias = "APPROVE")]
    Approve,
    /// The approver rejects the expense.
    #[serde(alias = "Reject", alias = "REJECT")]
    Reject,
}

impl Decision {
    /// Returns the string representation of the decision.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One approver slot in a rule or in a resolved approver list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    /// The approving user.
    pub user_id: UserId,
    /// A required approver's rejection is final and their approval is
    /// mandatory outside percentage mode.
    pub is_required: bool,
}

impl RuleApprover {
    /// Creates a required approver slot.
    #[must_use]
    pub const fn required(user_id: UserId) -> Self {
        Self {
            user_id,
            is_required: true,
        }
    }

    /// Creates an optional approver slot.
    #[must_use]
    pub const fn optional(user_id: UserId) -> Self {
        Self {
            user_id,
            is_required: false,
        }
    }
}

/// A decision recorded in an expense's approval ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Who decided.
    pub approver_id: UserId,
    /// What they decided.
    pub decision: Decision,
    /// When the decision was recorded.
    pub decided_at: DateTime<Utc>,
    /// Optional free-text note from the approver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Result of evaluating a rule against a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Derived status.
    pub status: ExpenseStatus,
    /// Approvers whose action is awaited, in resolved order. Empty when
    /// the status is terminal.
    pub next_required: Vec<UserId>,
}

impl Evaluation {
    /// A pending evaluation waiting on the given approvers.
    #[must_use]
    pub fn pending(next_required: Vec<UserId>) -> Self {
        Self {
            status: ExpenseStatus::Pending,
            next_required,
        }
    }

    /// A terminal approved evaluation.
    #[must_use]
    pub fn approved() -> Self {
        Self {
            status: ExpenseStatus::Approved,
            next_required: Vec::new(),
        }
    }

    /// A terminal rejected evaluation.
    #[must_use]
    pub fn rejected() -> Self {
        Self {
            status: ExpenseStatus::Rejected,
            next_required: Vec::new(),
        }
    }

    /// Returns true if the given user is awaited.
    #[must_use]
    pub fn awaits(&self, user_id: UserId) -> bool {
        self.next_required.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_matches_wire_format() {
        for status in [
            ExpenseStatus::Pending,
            ExpenseStatus::Approved,
            ExpenseStatus::Rejected,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ExpenseStatus::Pending.is_terminal());
        assert!(ExpenseStatus::Approved.is_terminal());
        assert!(ExpenseStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", ExpenseStatus::Rejected), "rejected");
    }

    #[test]
    fn test_decision_serde_accepts_wire_casing() {
        let d: Decision = serde_json::from_str("\"Approve\"").unwrap();
        assert_eq!(d, Decision::Approve);
        let d: Decision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(d, Decision::Reject);
        assert_eq!(serde_json::to_string(&Decision::Approve).unwrap(), "\"approve\"");
    }

    #[test]
    fn test_evaluation_constructors() {
        let user = UserId::new();
        let eval = Evaluation::pending(vec![user]);
        assert!(eval.awaits(user));
        assert!(!Evaluation::approved().awaits(user));
        assert!(Evaluation::rejected().next_required.is_empty());
    }
}
