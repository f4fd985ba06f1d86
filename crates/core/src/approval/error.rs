//! Approval error types.
//!
//! This module defines all errors that can occur while validating rules,
//! resolving approvers and recording decisions.

use expensa_shared::types::{ApprovalRuleId, ExpenseId, UserId};
use thiserror::Error;

use crate::approval::types::ExpenseStatus;

/// Reasons an approval rule fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// Rule name is blank.
    #[error("rule name is required")]
    EmptyName,

    /// Neither the manager nor any explicit approver is configured.
    #[error("rule needs at least one approver or the manager as approver")]
    NoApprovers,

    /// Sequential rule with nothing to put in sequence.
    #[error("sequential rule has no approvers to sequence")]
    NothingToSequence,

    /// The same user is listed twice.
    #[error("approver {0} is listed more than once")]
    DuplicateApprover(UserId),

    /// Percentage threshold outside `(0, 100]`.
    #[error("minimum approval percentage {0} must be between 1 and 100")]
    PercentageOutOfRange(i64),
}

/// Errors that can occur during approval operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Rule failed validation on create or update.
    #[error("Invalid approval rule: {0}")]
    InvalidRule(#[from] RuleViolation),

    /// Decision submitted by someone outside the resolved approver list.
    #[error("User {user_id} is not an approver for this expense")]
    NotAnApprover {
        /// The user who attempted to decide.
        user_id: UserId,
    },

    /// Sequential rule and it is someone else's turn.
    #[error("User {user_id} cannot decide yet; waiting on {expected:?}")]
    OutOfSequence {
        /// The user who attempted to decide.
        user_id: UserId,
        /// The approver whose turn it is.
        expected: Option<UserId>,
    },

    /// Decision submitted after the expense reached a terminal status.
    #[error("Expense is already {status}; no further decisions are accepted")]
    AlreadyTerminal {
        /// The terminal status.
        status: ExpenseStatus,
    },

    /// Manager-as-approver rule applied to an owner without a manager.
    #[error("User {owner_id} has no manager assigned")]
    ManagerNotAssigned {
        /// The expense owner.
        owner_id: UserId,
    },

    /// Resolution left nobody who can approve the expense.
    #[error("Rule resolves to no eligible approvers for user {owner_id}")]
    NoEligibleApprovers {
        /// The expense owner.
        owner_id: UserId,
    },

    /// Expense not found.
    #[error("Expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    /// Approval rule not found.
    #[error("Approval rule {0} not found")]
    RuleNotFound(ApprovalRuleId),

    /// User not found.
    #[error("User {0} not found")]
    UserNotFound(UserId),

    /// Concurrent writer won the race; the caller may retry.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ApprovalError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRule(_) => 400,

            Self::NotAnApprover { .. } | Self::OutOfSequence { .. } => 403,

            Self::ExpenseNotFound(_) | Self::RuleNotFound(_) | Self::UserNotFound(_) => 404,

            Self::AlreadyTerminal { .. } | Self::ConcurrentModification => 409,

            Self::ManagerNotAssigned { .. } | Self::NoEligibleApprovers { .. } => 422,

            Self::Database(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRule(_) => "INVALID_RULE",
            Self::NotAnApprover { .. } => "NOT_AN_APPROVER",
            Self::OutOfSequence { .. } => "OUT_OF_SEQUENCE",
            Self::AlreadyTerminal { .. } => "ALREADY_TERMINAL",
            Self::ManagerNotAssigned { .. } => "MANAGER_NOT_ASSIGNED",
            Self::NoEligibleApprovers { .. } => "NO_ELIGIBLE_APPROVERS",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Validation outcomes are final; only contention is worth another try.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}
