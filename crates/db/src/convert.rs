//! Conversions between database models and core domain types.

use expensa_core::approval::{
    ApprovalError, ApprovalLedger, ApprovalRule, Decision, DecisionRecord, ExpenseStatus,
    RuleApprover, RuleSnapshot,
};
use expensa_core::expense::{Expense, ExpenseCategory};
use expensa_core::identity::UserRole;
use expensa_shared::types::{Currency, ExpenseId, Money};

use crate::entities::{
    approval_decisions, approval_rule_approvers, approval_rules, expenses, sea_orm_active_enums,
};

impl From<sea_orm_active_enums::ExpenseStatus> for ExpenseStatus {
    fn from(status: sea_orm_active_enums::ExpenseStatus) -> Self {
        match status {
            sea_orm_active_enums::ExpenseStatus::Pending => Self::Pending,
            sea_orm_active_enums::ExpenseStatus::Approved => Self::Approved,
            sea_orm_active_enums::ExpenseStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<ExpenseStatus> for sea_orm_active_enums::ExpenseStatus {
    fn from(status: ExpenseStatus) -> Self {
        match status {
            ExpenseStatus::Pending => Self::Pending,
            ExpenseStatus::Approved => Self::Approved,
            ExpenseStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<sea_orm_active_enums::ApprovalDecision> for Decision {
    fn from(decision: sea_orm_active_enums::ApprovalDecision) -> Self {
        match decision {
            sea_orm_active_enums::ApprovalDecision::Approve => Self::Approve,
            sea_orm_active_enums::ApprovalDecision::Reject => Self::Reject,
        }
    }
}

impl From<Decision> for sea_orm_active_enums::ApprovalDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approve,
            Decision::Reject => Self::Reject,
        }
    }
}

impl From<sea_orm_active_enums::ExpenseCategory> for ExpenseCategory {
    fn from(category: sea_orm_active_enums::ExpenseCategory) -> Self {
        match category {
            sea_orm_active_enums::ExpenseCategory::Travel => Self::Travel,
            sea_orm_active_enums::ExpenseCategory::Food => Self::Food,
            sea_orm_active_enums::ExpenseCategory::OfficeSupplies => Self::OfficeSupplies,
            sea_orm_active_enums::ExpenseCategory::Other => Self::Other,
        }
    }
}

impl From<ExpenseCategory> for sea_orm_active_enums::ExpenseCategory {
    fn from(category: ExpenseCategory) -> Self {
        match category {
            ExpenseCategory::Travel => Self::Travel,
            ExpenseCategory::Food => Self::Food,
            ExpenseCategory::OfficeSupplies => Self::OfficeSupplies,
            ExpenseCategory::Other => Self::Other,
        }
    }
}

impl From<sea_orm_active_enums::UserRole> for UserRole {
    fn from(role: sea_orm_active_enums::UserRole) -> Self {
        match role {
            sea_orm_active_enums::UserRole::Admin => Self::Admin,
            sea_orm_active_enums::UserRole::Manager => Self::Manager,
            sea_orm_active_enums::UserRole::Employee => Self::Employee,
        }
    }
}

impl From<UserRole> for sea_orm_active_enums::UserRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Self::Admin,
            UserRole::Manager => Self::Manager,
            UserRole::Employee => Self::Employee,
        }
    }
}

/// Assembles a core rule from its row and approver rows.
pub fn rule_from_models(
    rule: approval_rules::Model,
    mut approvers: Vec<approval_rule_approvers::Model>,
) -> ApprovalRule {
    approvers.sort_by_key(|a| a.position);

    ApprovalRule {
        id: rule.id.into(),
        name: rule.name,
        description: rule.description,
        is_manager_approver: rule.is_manager_approver,
        approvers: approvers
            .into_iter()
            .map(|a| RuleApprover {
                user_id: a.user_id.into(),
                is_required: a.is_required,
            })
            .collect(),
        is_sequential: rule.is_sequential,
        minimum_approval_percentage: rule
            .minimum_approval_percentage
            .and_then(|p| u8::try_from(p).ok()),
    }
}

/// Converts a decision row into a ledger record.
pub fn record_from_model(model: approval_decisions::Model) -> DecisionRecord {
    DecisionRecord {
        approver_id: model.approver_id.into(),
        decision: model.decision.into(),
        decided_at: model.decided_at.into(),
        comment: model.comment,
    }
}

/// Rebuilds a ledger from decision rows ordered by first action.
pub fn ledger_from_models(
    expense_id: ExpenseId,
    rows: Vec<approval_decisions::Model>,
) -> ApprovalLedger {
    ApprovalLedger::from_records(expense_id, rows.into_iter().map(record_from_model))
}

/// Decodes the rule snapshot stored on an expense row.
///
/// # Errors
///
/// Returns `ApprovalError::Database` if the stored JSON is malformed.
pub fn snapshot_from_model(model: &expenses::Model) -> Result<RuleSnapshot, ApprovalError> {
    serde_json::from_value(model.rule_snapshot.clone()).map_err(|e| {
        ApprovalError::Database(format!("Corrupt rule snapshot on expense {}: {e}", model.id))
    })
}

/// Converts an expense row into the domain type.
///
/// # Errors
///
/// Returns `ApprovalError::Database` if the stored currency or snapshot is malformed.
pub fn expense_from_model(model: expenses::Model) -> Result<Expense, ApprovalError> {
    let rule_snapshot = snapshot_from_model(&model)?;
    let currency: Currency = model.currency.parse().map_err(|e| {
        ApprovalError::Database(format!("Corrupt currency on expense {}: {e}", model.id))
    })?;

    Ok(Expense {
        id: model.id.into(),
        owner_id: model.owner_id.into(),
        amount: Money::new(model.amount, currency),
        category: model.category.into(),
        description: model.description,
        date: model.expense_date,
        status: model.status.into(),
        rule_snapshot,
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    })
}
