//! Decision service.
//!
//! Applies one decision to an expense's ledger and reports how the
//! expense's status moved. Persistence and locking are the caller's job;
//! this service only works on in-memory state.

use chrono::{DateTime, Utc};
use expensa_shared::types::UserId;
use serde::Serialize;

use crate::approval::error::ApprovalError;
use crate::approval::ledger::ApprovalLedger;
use crate::approval::rule::RuleSnapshot;
use crate::approval::types::{Decision, DecisionRecord, Evaluation, ExpenseStatus};

/// Outcome of a successfully recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    /// The record as stored in the ledger.
    pub record: DecisionRecord,
    /// Status before the decision was applied.
    pub previous_status: ExpenseStatus,
    /// Evaluation after the decision was applied.
    pub evaluation: Evaluation,
}

impl DecisionOutcome {
    /// Returns true if this decision moved the expense to a terminal status.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        self.previous_status != self.evaluation.status
    }
}

/// Stateless service for submitting and querying decisions.
pub struct DecisionService;

impl DecisionService {
    /// Records a decision and re-evaluates the expense.
    ///
    /// # Arguments
    /// * `snapshot` - The rule frozen onto the expense
    /// * `ledger` - The expense's ledger; untouched on error
    /// * `approver_id` - The deciding user
    /// * `decision` - Approve or reject
    /// * `comment` - Optional note; blank comments are dropped
    /// * `decided_at` - Timestamp to record
    ///
    /// # Errors
    ///
    /// See [`ApprovalLedger::record_decision`].
    pub fn submit(
        snapshot: &RuleSnapshot,
        ledger: &mut ApprovalLedger,
        approver_id: UserId,
        decision: Decision,
        comment: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let previous_status = snapshot.evaluate(ledger).status;
        let record = ledger
            .record_decision(snapshot, approver_id, decision, decided_at, comment)?
            .clone();
        let evaluation = snapshot.evaluate(ledger);

        Ok(DecisionOutcome {
            record,
            previous_status,
            evaluation,
        })
    }

    /// Current status and awaited approvers. Read-only.
    #[must_use]
    pub fn query(snapshot: &RuleSnapshot, ledger: &ApprovalLedger) -> Evaluation {
        snapshot.evaluate(ledger)
    }
}
