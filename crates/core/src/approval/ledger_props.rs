//! Property-based tests for ApprovalLedger.

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;

use expensa_shared::types::{ApprovalRuleId, ExpenseId, UserId};

use crate::approval::ledger::ApprovalLedger;
use crate::approval::rule::{ApprovalRule, RuleSnapshot};
use crate::approval::types::{Decision, RuleApprover};

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Approve), Just(Decision::Reject)]
}

fn arb_comment() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[ a-z]{0,12}")
}

/// A parallel, percentage-free rule where everyone is required, so every
/// approver may act until the expense is decided.
fn parallel_snapshot(n: usize) -> RuleSnapshot {
    ApprovalRule {
        id: ApprovalRuleId::new(),
        name: "all hands".to_string(),
        description: None,
        is_manager_approver: false,
        approvers: (0..n).map(|_| RuleApprover::required(UserId::new())).collect(),
        is_sequential: false,
        minimum_approval_percentage: None,
    }
    .snapshot(UserId::new(), None, Utc::now())
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The ledger never holds more than one entry per approver.
    #[test]
    fn prop_at_most_one_entry_per_approver(
        n in 1usize..5,
        actions in prop::collection::vec((0usize..6, arb_decision(), arb_comment()), 0..25)
    ) {
        let snapshot = parallel_snapshot(n);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        for (idx, decision, comment) in actions {
            let user = snapshot.approvers.get(idx).map_or_else(UserId::new, |a| a.user_id);
            let _ = ledger.record_decision(&snapshot, user, decision, Utc::now(), comment);
        }

        let distinct: HashSet<_> = ledger.decisions().iter().map(|r| r.approver_id).collect();
        prop_assert_eq!(distinct.len(), ledger.len());
        prop_assert!(ledger.len() <= n);
        for record in ledger.decisions() {
            prop_assert!(snapshot.is_approver(record.approver_id));
        }
    }

    /// A failed submission leaves the ledger exactly as it was.
    #[test]
    fn prop_failed_submission_is_noop(
        n in 1usize..5,
        actions in prop::collection::vec((0usize..6, arb_decision()), 0..25)
    ) {
        let snapshot = parallel_snapshot(n);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());

        for (idx, decision) in actions {
            let user = snapshot.approvers.get(idx).map_or_else(UserId::new, |a| a.user_id);
            let before = ledger.clone();
            if ledger
                .record_decision(&snapshot, user, decision, Utc::now(), None)
                .is_err()
            {
                prop_assert_eq!(&ledger, &before);
            }
        }
    }

    /// Stored comments are trimmed and never blank.
    #[test]
    fn prop_comments_trimmed(comment in arb_comment()) {
        let snapshot = parallel_snapshot(2);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        let user = snapshot.approvers[0].user_id;

        let record = ledger
            .record_decision(&snapshot, user, Decision::Approve, Utc::now(), comment.clone())
            .unwrap();

        let expected = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        prop_assert_eq!(record.comment.clone(), expected);
    }

    /// Serializing and reloading a ledger never changes the evaluation.
    #[test]
    fn prop_json_round_trip_preserves_evaluation(
        n in 1usize..5,
        actions in prop::collection::vec((0usize..5, arb_decision()), 0..10)
    ) {
        let snapshot = parallel_snapshot(n);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        for (idx, decision) in actions {
            if let Some(a) = snapshot.approvers.get(idx) {
                let _ = ledger.record_decision(&snapshot, a.user_id, decision, Utc::now(), None);
            }
        }

        let snapshot_json = serde_json::to_string(&snapshot).unwrap();
        let ledger_json = serde_json::to_string(&ledger).unwrap();
        let snapshot_back: RuleSnapshot = serde_json::from_str(&snapshot_json).unwrap();
        let ledger_back: ApprovalLedger = serde_json::from_str(&ledger_json).unwrap();

        prop_assert_eq!(snapshot_back.evaluate(&ledger_back), snapshot.evaluate(&ledger));
    }
}
