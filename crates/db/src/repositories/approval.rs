//! Approval repository.
//!
//! Records decisions against expenses. Each submission runs in its own
//! database transaction holding a row lock on the expense, so concurrent
//! decisions on one expense are applied one at a time and every decision
//! sees the ledger left by the previous one.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use expensa_core::approval::{
    ApprovalError, ApprovalLedger, Decision, DecisionOutcome, DecisionRecord, DecisionService,
    Evaluation, ExpenseStatus, RuleApprover,
};
use expensa_shared::types::{ExpenseId, UserId};

use crate::convert::{ledger_from_models, snapshot_from_model};
use crate::entities::{approval_decisions, expenses};
use crate::retry::{RetryPolicy, map_commit_err, map_db_err, with_retry};

/// Read-only view of an expense's approval state.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalStatus {
    /// The expense.
    pub expense_id: ExpenseId,
    /// Derived status.
    pub status: ExpenseStatus,
    /// Approvers whose action is awaited.
    pub next_required: Vec<UserId>,
    /// Resolved approver list from the rule snapshot.
    pub approvers: Vec<RuleApprover>,
    /// Decisions recorded so far.
    pub decisions: Vec<DecisionRecord>,
}

/// Approval repository.
#[derive(Debug, Clone)]
pub struct ApprovalRepository {
    db: DatabaseConnection,
    retry: RetryPolicy,
}

impl ApprovalRepository {
    /// Creates a new approval repository with the given retry policy.
    #[must_use]
    pub const fn new(db: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Submits a decision and returns the re-evaluated status.
    ///
    /// Transient failures are retried per the repository's policy;
    /// validation failures are returned immediately with nothing written.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense does not exist
    /// - `AlreadyTerminal`, `NotAnApprover`, `OutOfSequence` from the ledger
    /// - `ConcurrentModification` if contention outlasts the retry budget
    /// - `Database` on other storage failures
    pub async fn submit_decision(
        &self,
        expense_id: ExpenseId,
        approver_id: UserId,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let result = with_retry(self.retry, move || {
            self.submit_once(expense_id, approver_id, decision, comment.clone(), Utc::now())
        })
        .await;

        match &result {
            Ok(outcome) => info!(
                expense_id = %expense_id,
                approver_id = %approver_id,
                decision = %decision,
                status = %outcome.evaluation.status,
                "Decision recorded"
            ),
            Err(e) => warn!(
                expense_id = %expense_id,
                approver_id = %approver_id,
                decision = %decision,
                error = %e,
                "Decision refused"
            ),
        }

        result
    }

    async fn submit_once(
        &self,
        expense_id: ExpenseId,
        approver_id: UserId,
        decision: Decision,
        comment: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let expense = expenses::Entity::find_by_id(Uuid::from(expense_id))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .ok_or(ApprovalError::ExpenseNotFound(expense_id))?;

        let snapshot = snapshot_from_model(&expense)?;
        let mut ledger = load_ledger(&txn, expense_id).await?;

        // Dropping `txn` on error rolls back.
        let outcome = DecisionService::submit(
            &snapshot,
            &mut ledger,
            approver_id,
            decision,
            comment,
            decided_at,
        )?;

        upsert_decision(&txn, expense_id, &outcome.record).await?;

        let mut active: expenses::ActiveModel = expense.into();
        active.status = Set(outcome.evaluation.status.into());
        active.updated_at = Set(decided_at.into());
        active.update(&txn).await.map_err(map_db_err)?;

        txn.commit().await.map_err(map_commit_err)?;

        Ok(outcome)
    }

    /// Current status, awaited approvers and decisions. Read-only.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense does not exist
    /// - `Database` on storage failure
    pub async fn query_status(&self, expense_id: ExpenseId) -> Result<ApprovalStatus, ApprovalError> {
        let expense = expenses::Entity::find_by_id(Uuid::from(expense_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(ApprovalError::ExpenseNotFound(expense_id))?;

        let snapshot = snapshot_from_model(&expense)?;
        let ledger = load_ledger(&self.db, expense_id).await?;
        let Evaluation {
            status,
            next_required,
        } = DecisionService::query(&snapshot, &ledger);

        Ok(ApprovalStatus {
            expense_id,
            status,
            next_required,
            approvers: snapshot.approvers,
            decisions: ledger.decisions().to_vec(),
        })
    }
}

async fn load_ledger<C: ConnectionTrait>(
    db: &C,
    expense_id: ExpenseId,
) -> Result<ApprovalLedger, ApprovalError> {
    let rows = approval_decisions::Entity::find()
        .filter(approval_decisions::Column::ExpenseId.eq(Uuid::from(expense_id)))
        .order_by_asc(approval_decisions::Column::CreatedAt)
        .order_by_asc(approval_decisions::Column::Id)
        .all(db)
        .await
        .map_err(map_db_err)?;
    Ok(ledger_from_models(expense_id, rows))
}

/// Writes the approver's row, replacing an earlier decision in place.
async fn upsert_decision<C: ConnectionTrait>(
    db: &C,
    expense_id: ExpenseId,
    record: &DecisionRecord,
) -> Result<(), ApprovalError> {
    let existing = approval_decisions::Entity::find()
        .filter(approval_decisions::Column::ExpenseId.eq(Uuid::from(expense_id)))
        .filter(approval_decisions::Column::ApproverId.eq(Uuid::from(record.approver_id)))
        .one(db)
        .await
        .map_err(map_db_err)?;

    match existing {
        Some(row) => {
            let mut active: approval_decisions::ActiveModel = row.into();
            active.decision = Set(record.decision.into());
            active.comment = Set(record.comment.clone());
            active.decided_at = Set(record.decided_at.into());
            active.update(db).await.map_err(map_db_err)?;
        }
        None => {
            approval_decisions::ActiveModel {
                id: Set(Uuid::now_v7()),
                expense_id: Set(expense_id.into()),
                approver_id: Set(record.approver_id.into()),
                decision: Set(record.decision.into()),
                comment: Set(record.comment.clone()),
                decided_at: Set(record.decided_at.into()),
                created_at: Set(record.decided_at.into()),
            }
            .insert(db)
            .await
            .map_err(map_db_err)?;
        }
    }

    Ok(())
}
