//! New expense validation.

use expensa_shared::types::{Currency, Money};

use crate::expense::error::ExpenseError;
use crate::expense::types::{ExpenseCategory, NewExpense, ValidatedExpense};

/// Validates a new expense and normalizes its fields.
///
/// Checks run in a fixed order and the first failure is returned:
/// amount, description, currency, category.
///
/// # Errors
///
/// Returns the first `ExpenseError` found.
pub fn validate_new_expense(input: &NewExpense) -> Result<ValidatedExpense, ExpenseError> {
    if input.amount.is_sign_negative() || input.amount.is_zero() {
        return Err(ExpenseError::NonPositiveAmount);
    }

    let description = input.description.trim();
    if description.is_empty() {
        return Err(ExpenseError::EmptyDescription);
    }

    let currency: Currency = input
        .currency
        .parse()
        .map_err(|_| ExpenseError::InvalidCurrency(input.currency.clone()))?;

    let category = ExpenseCategory::parse(&input.category)
        .ok_or_else(|| ExpenseError::UnknownCategory(input.category.clone()))?;

    Ok(ValidatedExpense {
        amount: Money::new(input.amount, currency),
        category,
        description: description.to_string(),
        date: input.date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn input() -> NewExpense {
        NewExpense {
            amount: dec!(567.00),
            currency: "usd".to_string(),
            category: "Food".to_string(),
            description: "  Client Dinner Q4 ".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        }
    }

    #[test]
    fn test_valid_expense_normalized() {
        let valid = validate_new_expense(&input()).unwrap();
        assert_eq!(valid.amount, Money::new(dec!(567.00), Currency::USD));
        assert_eq!(valid.category, ExpenseCategory::Food);
        assert_eq!(valid.description, "Client Dinner Q4");
    }

    #[rstest]
    #[case(dec!(0), ExpenseError::NonPositiveAmount)]
    #[case(dec!(-12.50), ExpenseError::NonPositiveAmount)]
    fn test_amount_must_be_positive(#[case] amount: rust_decimal::Decimal, #[case] expected: ExpenseError) {
        let mut e = input();
        e.amount = amount;
        assert_eq!(validate_new_expense(&e), Err(expected));
    }

    #[test]
    fn test_blank_description() {
        let mut e = input();
        e.description = "   ".to_string();
        assert_eq!(validate_new_expense(&e), Err(ExpenseError::EmptyDescription));
    }

    #[rstest]
    #[case("US")]
    #[case("EURO")]
    #[case("12$")]
    fn test_invalid_currency(#[case] code: &str) {
        let mut e = input();
        e.currency = code.to_string();
        assert_eq!(
            validate_new_expense(&e),
            Err(ExpenseError::InvalidCurrency(code.to_string()))
        );
    }

    #[test]
    fn test_unknown_category() {
        let mut e = input();
        e.category = "Entertainment".to_string();
        assert_eq!(
            validate_new_expense(&e),
            Err(ExpenseError::UnknownCategory("Entertainment".to_string()))
        );
    }

    #[rstest]
    #[case("Travel", ExpenseCategory::Travel)]
    #[case("Office Supplies", ExpenseCategory::OfficeSupplies)]
    #[case("office_supplies", ExpenseCategory::OfficeSupplies)]
    #[case("OTHER", ExpenseCategory::Other)]
    fn test_category_parse(#[case] raw: &str, #[case] expected: ExpenseCategory) {
        assert_eq!(ExpenseCategory::parse(raw), Some(expected));
    }
}
