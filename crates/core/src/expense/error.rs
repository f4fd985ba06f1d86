//! Expense validation errors.

use thiserror::Error;

/// Reasons a new expense is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseError {
    /// Amount is zero or negative.
    #[error("Expense amount must be greater than zero")]
    NonPositiveAmount,

    /// Description is blank.
    #[error("Expense description is required")]
    EmptyDescription,

    /// Currency code is not three ASCII letters.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Category is not one of the known categories.
    #[error("Unknown expense category: {0}")]
    UnknownCategory(String),
}

impl ExpenseError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        400
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        "INVALID_EXPENSE"
    }
}
