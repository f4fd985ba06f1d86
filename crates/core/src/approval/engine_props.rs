//! Property-based tests for ApprovalEngine.

use chrono::Utc;
use proptest::prelude::*;

use expensa_shared::types::{ApprovalRuleId, ExpenseId, UserId};

use crate::approval::engine::ApprovalEngine;
use crate::approval::error::ApprovalError;
use crate::approval::ledger::ApprovalLedger;
use crate::approval::rule::{ApprovalRule, RuleSnapshot};
use crate::approval::service::DecisionService;
use crate::approval::types::{Decision, DecisionRecord, ExpenseStatus, RuleApprover};

/// Approver required flags, sequential flag and optional threshold.
type RuleShape = (Vec<bool>, bool, Option<u8>);

fn arb_rule_shape() -> impl Strategy<Value = RuleShape> {
    (
        prop::collection::vec(any::<bool>(), 1..6),
        any::<bool>(),
        prop::option::of(1u8..=100),
    )
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Approve), Just(Decision::Reject)]
}

/// Per-slot decisions; `None` means the approver has not acted.
fn arb_votes() -> impl Strategy<Value = Vec<Option<Decision>>> {
    prop::collection::vec(prop::option::of(arb_decision()), 6)
}

/// Builds a snapshot; threshold-free parallel rules get at least one required approver.
fn build_snapshot((mut required, sequential, pct): RuleShape) -> RuleSnapshot {
    if !sequential && pct.is_none() {
        required[0] = true;
    }
    let approvers = required
        .into_iter()
        .map(|r| RuleApprover {
            user_id: UserId::new(),
            is_required: r,
        })
        .collect();

    ApprovalRule {
        id: ApprovalRuleId::new(),
        name: "generated".to_string(),
        description: None,
        is_manager_approver: false,
        approvers,
        is_sequential: sequential,
        minimum_approval_percentage: pct,
    }
    .snapshot(UserId::new(), None, Utc::now())
    .unwrap()
}

fn build_ledger(snapshot: &RuleSnapshot, votes: &[Option<Decision>]) -> ApprovalLedger {
    let records = snapshot
        .approvers
        .iter()
        .zip(votes)
        .filter_map(|(a, v)| {
            v.map(|decision| DecisionRecord {
                approver_id: a.user_id,
                decision,
                decided_at: Utc::now(),
                comment: None,
            })
        });
    ApprovalLedger::from_records(ExpenseId::new(), records)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A rejection by any required approver always rejects the expense.
    #[test]
    fn prop_required_reject_always_rejects(shape in arb_rule_shape(), votes in arb_votes()) {
        let snapshot = build_snapshot(shape);
        let ledger = build_ledger(&snapshot, &votes);

        let required_rejected = snapshot
            .approvers
            .iter()
            .any(|a| a.is_required && ledger.decision_of(a.user_id) == Some(Decision::Reject));

        if required_rejected {
            prop_assert_eq!(snapshot.evaluate(&ledger).status, ExpenseStatus::Rejected);
        }
    }

    /// Terminal evaluations wait on nobody; pending ones wait on undecided approvers.
    #[test]
    fn prop_next_required_consistent_with_status(shape in arb_rule_shape(), votes in arb_votes()) {
        let snapshot = build_snapshot(shape);
        let ledger = build_ledger(&snapshot, &votes);
        let eval = snapshot.evaluate(&ledger);

        if eval.status.is_terminal() {
            prop_assert!(eval.next_required.is_empty());
        } else {
            prop_assert!(!eval.next_required.is_empty());
            for user in &eval.next_required {
                prop_assert!(snapshot.is_approver(*user));
                prop_assert_eq!(ledger.decision_of(*user), None);
            }
            if snapshot.rule.is_sequential {
                prop_assert_eq!(eval.next_required.len(), 1);
            }
        }
    }

    /// Evaluation depends only on who decided what, not on recording order.
    #[test]
    fn prop_evaluation_ignores_record_order(shape in arb_rule_shape(), votes in arb_votes()) {
        let snapshot = build_snapshot(shape);
        let ledger = build_ledger(&snapshot, &votes);
        let reversed = ApprovalLedger::from_records(
            ledger.expense_id,
            ledger.decisions().iter().rev().cloned(),
        );

        prop_assert_eq!(snapshot.evaluate(&ledger), snapshot.evaluate(&reversed));
    }

    /// Once approved or rejected, every further submission fails and changes nothing.
    #[test]
    fn prop_terminal_status_is_sticky(
        shape in arb_rule_shape(),
        actions in prop::collection::vec((0usize..8, arb_decision()), 1..20)
    ) {
        let snapshot = build_snapshot(shape);
        let mut ledger = ApprovalLedger::new(ExpenseId::new());
        let stranger = UserId::new();
        let mut terminal: Option<ExpenseStatus> = None;

        for (idx, decision) in actions {
            let user = snapshot.approvers.get(idx).map_or(stranger, |a| a.user_id);
            let before = ledger.clone();
            let result = DecisionService::submit(&snapshot, &mut ledger, user, decision, None, Utc::now());

            if let Some(status) = terminal {
                let is_terminal_error = matches!(
                    result,
                    Err(ApprovalError::AlreadyTerminal { status: s }) if s == status
                );
                prop_assert!(is_terminal_error);
                prop_assert_eq!(&ledger, &before);
            } else if let Ok(outcome) = result
                && outcome.evaluation.status.is_terminal()
            {
                terminal = Some(outcome.evaluation.status);
            }
        }
    }

    /// In sequential rules only the first undecided approver may act.
    #[test]
    fn prop_sequential_order_enforced(
        (required, _, pct) in arb_rule_shape(),
        votes in arb_votes(),
        pick in 0usize..6
    ) {
        let snapshot = build_snapshot((required, true, pct));
        let ledger = build_ledger(&snapshot, &votes);
        let eval = snapshot.evaluate(&ledger);
        let Some(user) = snapshot.approvers.get(pick).map(|a| a.user_id) else {
            return Ok(());
        };

        let result = ApprovalEngine::ensure_may_decide(
            &snapshot.rule,
            &snapshot.approvers,
            &ledger,
            user,
        );

        if eval.status.is_terminal() {
            let is_terminal_error = matches!(result, Err(ApprovalError::AlreadyTerminal { .. }));
            prop_assert!(is_terminal_error);
        } else if eval.next_required.first() == Some(&user) {
            prop_assert!(result.is_ok());
        } else {
            let is_out_of_sequence = matches!(result, Err(ApprovalError::OutOfSequence { .. }));
            prop_assert!(is_out_of_sequence);
        }
    }

    /// With a threshold, reaching it approves unless a required approver rejected.
    #[test]
    fn prop_threshold_reached_approves(
        (required, sequential, _) in arb_rule_shape(),
        pct in 1u8..=100,
        votes in arb_votes()
    ) {
        let snapshot = build_snapshot((required, sequential, Some(pct)));
        let ledger = build_ledger(&snapshot, &votes);

        let total = snapshot.approvers.len();
        let approved = snapshot
            .approvers
            .iter()
            .filter(|a| ledger.decision_of(a.user_id) == Some(Decision::Approve))
            .count();
        let required_rejected = snapshot
            .approvers
            .iter()
            .any(|a| a.is_required && ledger.decision_of(a.user_id) == Some(Decision::Reject));

        let status = snapshot.evaluate(&ledger).status;
        if required_rejected {
            prop_assert_eq!(status, ExpenseStatus::Rejected);
        } else if approved * 100 >= usize::from(pct) * total {
            prop_assert_eq!(status, ExpenseStatus::Approved);
        } else {
            prop_assert_ne!(status, ExpenseStatus::Approved);
        }
    }
}
