//! Approval evaluation engine.
//!
//! Computes an expense's status and the approvers it is waiting on from a
//! rule, its resolved approver list and the ledger. Nothing here is cached:
//! every call recomputes from scratch.

use expensa_shared::types::UserId;

use crate::approval::error::ApprovalError;
use crate::approval::ledger::ApprovalLedger;
use crate::approval::rule::ApprovalRule;
use crate::approval::types::{Decision, Evaluation, RuleApprover};

/// Stateless engine for evaluating approval rules.
pub struct ApprovalEngine;

impl ApprovalEngine {
    /// Evaluates the ledger against a rule and its resolved approvers.
    ///
    /// Order of precedence:
    /// 1. A required approver's rejection rejects the expense.
    /// 2. With a percentage threshold, the expense is approved once
    ///    `approved / total >= threshold`, and rejected once everyone has
    ///    decided without reaching it.
    /// 3. Sequential rules approve once every slot has decided; the first
    ///    undecided slot is next.
    /// 4. Parallel rules approve once every required approver approved.
    #[must_use]
    pub fn evaluate(
        rule: &ApprovalRule,
        approvers: &[RuleApprover],
        ledger: &ApprovalLedger,
    ) -> Evaluation {
        let required_rejected = approvers
            .iter()
            .any(|a| a.is_required && ledger.decision_of(a.user_id) == Some(Decision::Reject));
        if required_rejected {
            return Evaluation::rejected();
        }

        if approvers.is_empty() {
            return Evaluation::pending(Vec::new());
        }

        let undecided = approvers
            .iter()
            .filter(|a| ledger.decision_of(a.user_id).is_none())
            .map(|a| a.user_id);

        if let Some(pct) = rule.minimum_approval_percentage {
            let total = approvers.len();
            let approved = approvers
                .iter()
                .filter(|a| ledger.decision_of(a.user_id) == Some(Decision::Approve))
                .count();

            if Self::meets_threshold(approved, total, pct) {
                return Evaluation::approved();
            }

            let next: Vec<UserId> = if rule.is_sequential {
                undecided.take(1).collect()
            } else {
                undecided.collect()
            };

            return if next.is_empty() {
                Evaluation::rejected()
            } else {
                Evaluation::pending(next)
            };
        }

        if rule.is_sequential {
            return match undecided.into_iter().next() {
                Some(next) => Evaluation::pending(vec![next]),
                None => Evaluation::approved(),
            };
        }

        let waiting: Vec<UserId> = approvers
            .iter()
            .filter(|a| a.is_required && ledger.decision_of(a.user_id) != Some(Decision::Approve))
            .map(|a| a.user_id)
            .collect();

        if waiting.is_empty() {
            Evaluation::approved()
        } else {
            Evaluation::pending(waiting)
        }
    }

    /// Checks whether `user_id` may record a decision right now.
    ///
    /// In sequential rules only the current next approver may act; an
    /// out-of-turn decision is refused rather than silently ignored.
    ///
    /// # Errors
    ///
    /// - `AlreadyTerminal` if the expense is approved or rejected
    /// - `NotAnApprover` if the user is not in the resolved list
    /// - `OutOfSequence` if it is another approver's turn
    pub fn ensure_may_decide(
        rule: &ApprovalRule,
        approvers: &[RuleApprover],
        ledger: &ApprovalLedger,
        user_id: UserId,
    ) -> Result<(), ApprovalError> {
        let evaluation = Self::evaluate(rule, approvers, ledger);

        if evaluation.status.is_terminal() {
            return Err(ApprovalError::AlreadyTerminal {
                status: evaluation.status,
            });
        }

        if !approvers.iter().any(|a| a.user_id == user_id) {
            return Err(ApprovalError::NotAnApprover { user_id });
        }

        if rule.is_sequential && !evaluation.awaits(user_id) {
            return Err(ApprovalError::OutOfSequence {
                user_id,
                expected: evaluation.next_required.first().copied(),
            });
        }

        Ok(())
    }

    /// `approved / total * 100 >= pct`, in integer arithmetic.
    fn meets_threshold(approved: usize, total: usize, pct: u8) -> bool {
        approved * 100 >= usize::from(pct) * total
    }
}
