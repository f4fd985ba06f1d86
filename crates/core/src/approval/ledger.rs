//! Per-expense approval ledger.
//!
//! The ledger is the only mutable approval state: an ordered list of
//! decisions, at most one per approver. Status is never stored here; it is
//! always derived by the engine.

use chrono::{DateTime, Utc};
use expensa_shared::types::{ExpenseId, UserId};
use serde::{Deserialize, Serialize};

use crate::approval::engine::ApprovalEngine;
use crate::approval::error::ApprovalError;
use crate::approval::rule::RuleSnapshot;
use crate::approval::types::{Decision, DecisionRecord};

/// Decisions recorded against one expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLedger {
    /// The expense this ledger belongs to.
    pub expense_id: ExpenseId,
    decisions: Vec<DecisionRecord>,
}

impl ApprovalLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new(expense_id: ExpenseId) -> Self {
        Self {
            expense_id,
            decisions: Vec::new(),
        }
    }

    /// Rebuilds a ledger from stored records, oldest first.
    ///
    /// Repeated approvers collapse to their latest decision.
    #[must_use]
    pub fn from_records(expense_id: ExpenseId, records: impl IntoIterator<Item = DecisionRecord>) -> Self {
        let mut ledger = Self::new(expense_id);
        for record in records {
            ledger.upsert(record);
        }
        ledger
    }

    /// All decisions in the order approvers first acted.
    #[must_use]
    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    /// Number of approvers who have decided.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Returns true if no one has decided yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Returns the recorded decision of an approver, if any.
    #[must_use]
    pub fn decision_of(&self, user_id: UserId) -> Option<Decision> {
        self.record_of(user_id).map(|r| r.decision)
    }

    /// Returns the full record of an approver, if any.
    #[must_use]
    pub fn record_of(&self, user_id: UserId) -> Option<&DecisionRecord> {
        self.decisions.iter().find(|r| r.approver_id == user_id)
    }

    /// Records an approver's decision.
    ///
    /// The ledger is left untouched when an error is returned.
    ///
    /// # Errors
    ///
    /// - `AlreadyTerminal` if the expense is already approved or rejected
    /// - `NotAnApprover` if the user is not in the resolved approver list
    /// - `OutOfSequence` if the rule is sequential and it is not the user's turn
    pub fn record_decision(
        &mut self,
        snapshot: &RuleSnapshot,
        approver_id: UserId,
        decision: Decision,
        decided_at: DateTime<Utc>,
        comment: Option<String>,
    ) -> Result<&DecisionRecord, ApprovalError> {
        ApprovalEngine::ensure_may_decide(&snapshot.rule, &snapshot.approvers, self, approver_id)?;

        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(self.upsert(DecisionRecord {
            approver_id,
            decision,
            decided_at,
            comment,
        }))
    }

    /// Last write wins: a repeated approver replaces their entry in place.
    fn upsert(&mut self, record: DecisionRecord) -> &DecisionRecord {
        let idx = match self
            .decisions
            .iter()
            .position(|r| r.approver_id == record.approver_id)
        {
            Some(idx) => {
                self.decisions[idx] = record;
                idx
            }
            None => {
                self.decisions.push(record);
                self.decisions.len() - 1
            }
        };
        &self.decisions[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::rule::ApprovalRule;
    use crate::approval::types::{ExpenseStatus, RuleApprover};
    use expensa_shared::types::ApprovalRuleId;

    fn snapshot(approvers: Vec<RuleApprover>, sequential: bool) -> RuleSnapshot {
        ApprovalRule {
            id: ApprovalRuleId::new(),
            name: "Project Team Approvals".to_string(),
            description: None,
            is_manager_approver: false,
            approvers,
            is_sequential: sequential,
            minimum_approval_percentage: None,
        }
        .snapshot(UserId::new(), None, Utc::now())
        .unwrap()
    }

    #[test]
    fn test_record_appends() {
        let (a, b) = (UserId::new(), UserId::new());
        let snap = snapshot(vec![RuleApprover::required(a), RuleApprover::required(b)], false);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        ledger
            .record_decision(&snap, b, Decision::Approve, Utc::now(), None)
            .unwrap();
        ledger
            .record_decision(&snap, a, Decision::Approve, Utc::now(), Some("ok".into()))
            .unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.decisions()[0].approver_id, b);
        assert_eq!(ledger.record_of(a).unwrap().comment.as_deref(), Some("ok"));
    }

    #[test]
    fn test_record_blank_comment_dropped() {
        let a = UserId::new();
        let snap = snapshot(vec![RuleApprover::required(a), RuleApprover::required(UserId::new())], false);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        let record = ledger
            .record_decision(&snap, a, Decision::Approve, Utc::now(), Some("   ".into()))
            .unwrap();
        assert_eq!(record.comment, None);
    }

    #[test]
    fn test_last_write_wins_for_same_approver() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let snap = snapshot(
            vec![
                RuleApprover::required(a),
                RuleApprover::required(b),
                RuleApprover::optional(c),
            ],
            false,
        );
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        ledger
            .record_decision(&snap, c, Decision::Reject, Utc::now(), None)
            .unwrap();
        ledger
            .record_decision(&snap, a, Decision::Approve, Utc::now(), None)
            .unwrap();
        ledger
            .record_decision(&snap, c, Decision::Approve, Utc::now(), None)
            .unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.decisions()[0].approver_id, c);
        assert_eq!(ledger.decision_of(c), Some(Decision::Approve));
    }

    #[test]
    fn test_not_an_approver_leaves_ledger_untouched() {
        let snap = snapshot(vec![RuleApprover::required(UserId::new())], false);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        let stranger = UserId::new();

        let result = ledger.record_decision(&snap, stranger, Decision::Approve, Utc::now(), None);
        assert!(matches!(
            result,
            Err(ApprovalError::NotAnApprover { user_id }) if user_id == stranger
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_already_terminal() {
        let a = UserId::new();
        let snap = snapshot(vec![RuleApprover::required(a)], false);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        ledger
            .record_decision(&snap, a, Decision::Reject, Utc::now(), None)
            .unwrap();
        let before = ledger.clone();

        let result = ledger.record_decision(&snap, a, Decision::Approve, Utc::now(), None);
        assert!(matches!(
            result,
            Err(ApprovalError::AlreadyTerminal {
                status: ExpenseStatus::Rejected
            })
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_out_of_sequence_rejected() {
        let (a, b) = (UserId::new(), UserId::new());
        let snap = snapshot(vec![RuleApprover::required(a), RuleApprover::required(b)], true);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        let result = ledger.record_decision(&snap, b, Decision::Approve, Utc::now(), None);
        assert!(matches!(
            result,
            Err(ApprovalError::OutOfSequence { user_id, expected: Some(expected) })
                if user_id == b && expected == a
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_from_records_collapses_repeats() {
        let a = UserId::new();
        let t0 = Utc::now();
        let records = vec![
            DecisionRecord {
                approver_id: a,
                decision: Decision::Reject,
                decided_at: t0,
                comment: None,
            },
            DecisionRecord {
                approver_id: a,
                decision: Decision::Approve,
                decided_at: t0,
                comment: None,
            },
        ];
        let ledger = ApprovalLedger::from_records(ExpenseId::new(), records);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.decision_of(a), Some(Decision::Approve));
    }

    #[test]
    fn test_ledger_json_round_trip_same_evaluation() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let snap = snapshot(
            vec![
                RuleApprover::required(a),
                RuleApprover::required(b),
                RuleApprover::optional(c),
            ],
            false,
        );
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        ledger
            .record_decision(&snap, a, Decision::Approve, Utc::now(), Some("fine".into()))
            .unwrap();
        ledger
            .record_decision(&snap, c, Decision::Reject, Utc::now(), None)
            .unwrap();

        let json = serde_json::to_string(&ledger).unwrap();
        let reloaded: ApprovalLedger = serde_json::from_str(&json).unwrap();

        assert_eq!(reloaded, ledger);
        assert_eq!(snap.evaluate(&reloaded), snap.evaluate(&ledger));
    }
}
