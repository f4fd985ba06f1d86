//! Expense submission.
//!
//! Input validation and the domain representation of a submitted expense.
//! Approval state lives in [`crate::approval`].

pub mod error;
pub mod types;
pub mod validation;

pub use error::ExpenseError;
pub use types::{Expense, ExpenseCategory, NewExpense, ValidatedExpense};
pub use validation::validate_new_expense;
