//! Expense approval rules and decision evaluation.
//!
//! # Modules
//!
//! - `types` - Status, decision and approver slot types
//! - `error` - Approval-specific error types
//! - `rule` - Approval rule model, validation and approver resolution
//! - `ledger` - Per-expense decision ledger
//! - `engine` - Status evaluation
//! - `service` - Decision submission

pub mod engine;
pub mod error;
pub mod ledger;
pub mod rule;
pub mod service;
pub mod types;

#[cfg(test)]
mod engine_props;
#[cfg(test)]
mod ledger_props;

pub use engine::ApprovalEngine;
pub use error::{ApprovalError, RuleViolation};
pub use ledger::ApprovalLedger;
pub use rule::{ApprovalRule, RuleSnapshot, checked_percentage};
pub use service::{DecisionOutcome, DecisionService};
pub use types::{Decision, DecisionRecord, Evaluation, ExpenseStatus, RuleApprover};
