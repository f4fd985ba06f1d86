//! Expense repository.
//!
//! Creating an expense freezes the chosen approval rule onto it: the rule is
//! validated, approvers are resolved for the owner and the result is stored
//! as a JSON snapshot next to the expense.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use expensa_core::approval::{ApprovalError, ApprovalLedger, Evaluation};
use expensa_core::expense::{Expense, ExpenseError, NewExpense, validate_new_expense};
use expensa_shared::types::{ApprovalRuleId, ExpenseId, PageRequest, PageResponse, UserId};

use crate::convert::{expense_from_model, ledger_from_models};
use crate::entities::{approval_decisions, expenses, sea_orm_active_enums};
use crate::retry::map_db_err;

use super::approval_rule::load_rule;
use super::user::find_user;

/// Errors that can occur while submitting an expense.
#[derive(Debug, Error)]
pub enum SubmitExpenseError {
    /// The expense itself is invalid.
    #[error(transparent)]
    Invalid(#[from] ExpenseError),

    /// The rule could not be applied to this owner.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl SubmitExpenseError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Invalid(e) => e.status_code(),
            Self::Approval(e) => e.status_code(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(e) => e.error_code(),
            Self::Approval(e) => e.error_code(),
        }
    }
}

/// Rows fetched per round trip while scanning an approver's queue.
const PENDING_SCAN_BATCH: u64 = 200;

/// A pending expense together with its current evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    /// The expense.
    pub expense: Expense,
    /// Who the expense is waiting on.
    pub evaluation: Evaluation,
}

/// Expense repository.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Validates and stores a new expense under the given rule.
    ///
    /// # Errors
    ///
    /// - `Invalid` if the amount, description, currency or category is bad
    /// - `UserNotFound` / `RuleNotFound` if the owner or an active rule is missing
    /// - `ManagerNotAssigned` / `NoEligibleApprovers` if approvers cannot be resolved
    /// - `Database` on storage failure
    pub async fn create_expense(
        &self,
        owner_id: UserId,
        rule_id: ApprovalRuleId,
        input: NewExpense,
    ) -> Result<Expense, SubmitExpenseError> {
        let valid = validate_new_expense(&input)?;

        let owner = find_user(&self.db, owner_id)
            .await
            .map_err(map_db_err)?
            .ok_or(ApprovalError::UserNotFound(owner_id))?;

        let stored = load_rule(&self.db, rule_id).await?;
        if !stored.is_active {
            return Err(ApprovalError::RuleNotFound(rule_id).into());
        }

        let now = Utc::now();
        let snapshot = stored
            .rule
            .snapshot(owner_id, owner.manager_id.map(UserId::from), now)?;
        let id = ExpenseId::new();
        let status = snapshot.evaluate(&ApprovalLedger::new(id)).status;
        let snapshot_json = serde_json::to_value(&snapshot)
            .map_err(|e| ApprovalError::Database(e.to_string()))?;

        let model = expenses::ActiveModel {
            id: Set(id.into()),
            owner_id: Set(owner_id.into()),
            amount: Set(valid.amount.amount),
            currency: Set(valid.amount.currency.as_str().to_string()),
            category: Set(valid.category.into()),
            description: Set(valid.description),
            expense_date: Set(valid.date),
            status: Set(status.into()),
            rule_id: Set(rule_id.into()),
            rule_snapshot: Set(snapshot_json),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(map_db_err)?;

        info!(
            expense_id = %id,
            owner_id = %owner_id,
            rule_id = %rule_id,
            approvers = snapshot.approvers.len(),
            "Expense submitted"
        );

        Ok(expense_from_model(model)?)
    }

    /// Gets an expense by ID.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if no expense has this ID
    /// - `Database` on storage failure
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, ApprovalError> {
        let model = expenses::Entity::find_by_id(Uuid::from(id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(ApprovalError::ExpenseNotFound(id))?;
        expense_from_model(model)
    }

    /// Lists an owner's expenses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_expenses(
        &self,
        owner_id: UserId,
        page: &PageRequest,
    ) -> Result<PageResponse<Expense>, ApprovalError> {
        let page = page.normalized();
        let paginator = expenses::Entity::find()
            .filter(expenses::Column::OwnerId.eq(Uuid::from(owner_id)))
            .order_by_desc(expenses::Column::CreatedAt)
            .order_by_desc(expenses::Column::Id)
            .paginate(&self.db, page.limit());

        let total = paginator.num_items().await.map_err(map_db_err)?;
        let rows = paginator
            .fetch_page(u64::from(page.page - 1))
            .await
            .map_err(map_db_err)?;

        let data = rows
            .into_iter()
            .map(expense_from_model)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Pending expenses currently waiting on `approver_id`, oldest first.
    ///
    /// Candidates are pending expenses whose snapshot lists the approver and
    /// that carry no decision from them yet. They are scanned in batches and
    /// re-evaluated, so sequential rules only count once it is the
    /// approver's turn.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn pending_for_approver(
        &self,
        approver_id: UserId,
        page: &PageRequest,
    ) -> Result<PageResponse<PendingApproval>, ApprovalError> {
        let page = page.normalized();
        let skip = page.offset();
        let per_page = usize::try_from(page.per_page).unwrap_or(usize::MAX);

        let mut candidates = expenses::Entity::find()
            .filter(expenses::Column::Status.eq(sea_orm_active_enums::ExpenseStatus::Pending))
            .filter(Expr::cust_with_values(
                "rule_snapshot -> 'approvers' @> ?::jsonb",
                [serde_json::json!([{ "user_id": approver_id }])],
            ))
            .filter(Expr::cust_with_values(
                "NOT EXISTS (SELECT 1 FROM approval_decisions d \
                 WHERE d.expense_id = expenses.id AND d.approver_id = ?)",
                [Uuid::from(approver_id)],
            ))
            .order_by_asc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::Id)
            .paginate(&self.db, PENDING_SCAN_BATCH);

        let mut total = 0u64;
        let mut data = Vec::with_capacity(per_page.min(64));
        while let Some(batch) = candidates.fetch_and_next().await.map_err(map_db_err)? {
            for pending in self.awaiting(batch, approver_id).await? {
                if total >= skip && data.len() < per_page {
                    data.push(pending);
                }
                total += 1;
            }
        }

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Evaluates one batch of candidates and keeps those waiting on `approver_id`.
    async fn awaiting(
        &self,
        batch: Vec<expenses::Model>,
        approver_id: UserId,
    ) -> Result<Vec<PendingApproval>, ApprovalError> {
        let mut decisions: HashMap<Uuid, Vec<approval_decisions::Model>> = HashMap::new();
        for row in approval_decisions::Entity::find()
            .filter(approval_decisions::Column::ExpenseId.is_in(batch.iter().map(|e| e.id)))
            .order_by_asc(approval_decisions::Column::CreatedAt)
            .order_by_asc(approval_decisions::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?
        {
            decisions.entry(row.expense_id).or_default().push(row);
        }

        let mut pending = Vec::new();
        for model in batch {
            let rows = decisions.remove(&model.id).unwrap_or_default();
            let expense = expense_from_model(model)?;
            let ledger = ledger_from_models(expense.id, rows);
            let evaluation = expense.rule_snapshot.evaluate(&ledger);
            if evaluation.awaits(approver_id) {
                pending.push(PendingApproval {
                    expense,
                    evaluation,
                });
            }
        }

        Ok(pending)
    }
}
