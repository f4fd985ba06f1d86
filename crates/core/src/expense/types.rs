//! Expense domain types.

use chrono::{DateTime, NaiveDate, Utc};
use expensa_shared::types::{ExpenseId, Money, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::approval::{ExpenseStatus, RuleSnapshot};

/// What an expense was spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    /// Flights, hotels, mileage.
    Travel,
    /// Meals and client dinners.
    Food,
    /// Stationery and small equipment.
    #[serde(alias = "Office Supplies")]
    OfficeSupplies,
    /// Anything else.
    Other,
}

impl ExpenseCategory {
    /// Returns the string representation of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Food => "food",
            Self::OfficeSupplies => "office_supplies",
            Self::Other => "other",
        }
    }

    /// Parses a category, accepting display names like "Office Supplies".
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "travel" => Some(Self::Travel),
            "food" => Some(Self::Food),
            "officesupplies" => Some(Self::OfficeSupplies),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated input for a new expense.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    /// Amount as entered.
    pub amount: rust_decimal::Decimal,
    /// Currency code as entered.
    pub currency: String,
    /// Category as entered.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Date the expense was incurred.
    pub date: NaiveDate,
}

/// A new expense that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedExpense {
    /// Amount and currency.
    pub amount: Money,
    /// Parsed category.
    pub category: ExpenseCategory,
    /// Trimmed description.
    pub description: String,
    /// Date the expense was incurred.
    pub date: NaiveDate,
}

/// A submitted expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expense {
    /// Unique identifier.
    pub id: ExpenseId,
    /// The employee who submitted it.
    pub owner_id: UserId,
    /// Amount and currency.
    pub amount: Money,
    /// Category.
    pub category: ExpenseCategory,
    /// Description.
    pub description: String,
    /// Date the expense was incurred.
    pub date: NaiveDate,
    /// Last evaluated status, refreshed with every decision.
    pub status: ExpenseStatus,
    /// Rule frozen at submission.
    pub rule_snapshot: RuleSnapshot,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}
