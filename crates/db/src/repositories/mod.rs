//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod approval;
pub mod approval_rule;
pub mod expense;
pub mod user;

pub use approval::{ApprovalRepository, ApprovalStatus};
pub use approval_rule::{
    ApprovalRuleRepository, CreateApprovalRuleInput, StoredRule, UpdateApprovalRuleInput,
};
pub use expense::{ExpenseRepository, PendingApproval, SubmitExpenseError};
pub use user::{CreateUserInput, UserRepository};
