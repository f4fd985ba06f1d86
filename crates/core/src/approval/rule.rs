//! Approval rule model.
//!
//! A rule describes who has to sign off on an expense: optionally the
//! owner's direct manager, followed by an explicit list of approvers that
//! act either in order or in parallel, optionally with a percentage
//! threshold. A [`RuleSnapshot`] freezes a rule together with its resolved
//! approver list at submission time.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use expensa_shared::types::{ApprovalRuleId, UserId};
use serde::{Deserialize, Serialize};

use crate::approval::engine::ApprovalEngine;
use crate::approval::error::{ApprovalError, RuleViolation};
use crate::approval::ledger::ApprovalLedger;
use crate::approval::types::{Evaluation, RuleApprover};

/// Converts a raw percentage from user input into a threshold.
///
/// # Errors
///
/// Returns `PercentageOutOfRange` unless `1 <= raw <= 100`.
pub fn checked_percentage(raw: i64) -> Result<u8, RuleViolation> {
    match u8::try_from(raw) {
        Ok(pct) if (1..=100).contains(&pct) => Ok(pct),
        _ => Err(RuleViolation::PercentageOutOfRange(raw)),
    }
}

/// An admin-configured approval rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique identifier for the rule.
    pub id: ApprovalRuleId,
    /// Human-readable name for the rule.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Insert the owner's direct manager as the first, required approver.
    pub is_manager_approver: bool,
    /// Explicit approvers; order only matters when `is_sequential`.
    pub approvers: Vec<RuleApprover>,
    /// Approvers act strictly in list order.
    pub is_sequential: bool,
    /// Approve once this share of approvers (in percent) has approved.
    #[serde(default)]
    pub minimum_approval_percentage: Option<u8>,
}

impl ApprovalRule {
    /// Validates the rule's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `ApprovalError::InvalidRule` with the first violation found.
    pub fn validate(&self) -> Result<(), ApprovalError> {
        if self.name.trim().is_empty() {
            return Err(RuleViolation::EmptyName.into());
        }

        if self.approvers.is_empty() && !self.is_manager_approver {
            return Err(if self.is_sequential {
                RuleViolation::NothingToSequence
            } else {
                RuleViolation::NoApprovers
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(self.approvers.len());
        for approver in &self.approvers {
            if !seen.insert(approver.user_id) {
                return Err(RuleViolation::DuplicateApprover(approver.user_id).into());
            }
        }

        if let Some(pct) = self.minimum_approval_percentage {
            if pct == 0 || pct > 100 {
                return Err(RuleViolation::PercentageOutOfRange(i64::from(pct)).into());
            }
        }

        Ok(())
    }

    /// Resolves the concrete, ordered approver list for one expense.
    ///
    /// The manager (when enabled) comes first and is required, followed by
    /// the explicit approvers in listed order. A user appearing twice keeps
    /// the first slot and is required if either slot was. The owner never
    /// approves their own expense and is dropped from the list.
    ///
    /// # Errors
    ///
    /// - `ManagerNotAssigned` if the manager is needed but `manager_id` is `None`
    /// - `NoEligibleApprovers` if nobody is left to decide, or dropping the
    ///   owner removed every required approver of a parallel rule without a
    ///   threshold
    pub fn resolve_approvers(
        &self,
        owner_id: UserId,
        manager_id: Option<UserId>,
    ) -> Result<Vec<RuleApprover>, ApprovalError> {
        let mut resolved: Vec<RuleApprover> = Vec::with_capacity(self.approvers.len() + 1);

        if self.is_manager_approver {
            let manager = manager_id.ok_or(ApprovalError::ManagerNotAssigned { owner_id })?;
            resolved.push(RuleApprover::required(manager));
        }

        for approver in &self.approvers {
            match resolved.iter_mut().find(|r| r.user_id == approver.user_id) {
                Some(existing) => existing.is_required |= approver.is_required,
                None => resolved.push(*approver),
            }
        }

        let had_required = resolved.iter().any(|r| r.is_required);
        resolved.retain(|r| r.user_id != owner_id);

        // Dropping the owner must not leave nobody whose approval is mandatory.
        let lost_required = !self.is_sequential
            && self.minimum_approval_percentage.is_none()
            && had_required
            && !resolved.iter().any(|r| r.is_required);

        if resolved.is_empty() || lost_required {
            return Err(ApprovalError::NoEligibleApprovers { owner_id });
        }

        Ok(resolved)
    }

    /// Validates the rule and freezes it for one expense.
    ///
    /// # Errors
    ///
    /// Propagates validation and resolution errors.
    pub fn snapshot(
        &self,
        owner_id: UserId,
        manager_id: Option<UserId>,
        taken_at: DateTime<Utc>,
    ) -> Result<RuleSnapshot, ApprovalError> {
        self.validate()?;
        let approvers = self.resolve_approvers(owner_id, manager_id)?;
        Ok(RuleSnapshot {
            rule: self.clone(),
            owner_id,
            approvers,
            taken_at,
        })
    }
}

/// A rule frozen onto an expense at submission time.
///
/// Later edits to the rule never change how an in-flight expense is
/// evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    /// The rule as configured at submission.
    pub rule: ApprovalRule,
    /// The expense owner the approvers were resolved for.
    pub owner_id: UserId,
    /// Resolved approver list.
    pub approvers: Vec<RuleApprover>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl RuleSnapshot {
    /// Evaluates the ledger against this snapshot.
    #[must_use]
    pub fn evaluate(&self, ledger: &ApprovalLedger) -> Evaluation {
        ApprovalEngine::evaluate(&self.rule, &self.approvers, ledger)
    }

    /// Returns true if the user is in the resolved approver list.
    #[must_use]
    pub fn is_approver(&self, user_id: UserId) -> bool {
        self.approvers.iter().any(|a| a.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(approvers: Vec<RuleApprover>) -> ApprovalRule {
        ApprovalRule {
            id: ApprovalRuleId::new(),
            name: "Miscellaneous Expenses Over $100".to_string(),
            description: None,
            is_manager_approver: false,
            approvers,
            is_sequential: false,
            minimum_approval_percentage: None,
        }
    }

    fn violation(result: Result<(), ApprovalError>) -> RuleViolation {
        match result {
            Err(ApprovalError::InvalidRule(v)) => v,
            other => panic!("expected InvalidRule, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_ok() {
        let r = rule(vec![RuleApprover::required(UserId::new())]);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_validate_manager_only_ok() {
        let mut r = rule(vec![]);
        r.is_manager_approver = true;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_name() {
        let mut r = rule(vec![RuleApprover::required(UserId::new())]);
        r.name = "   ".to_string();
        assert_eq!(violation(r.validate()), RuleViolation::EmptyName);
    }

    #[test]
    fn test_validate_no_approvers() {
        assert_eq!(violation(rule(vec![]).validate()), RuleViolation::NoApprovers);
    }

    #[test]
    fn test_validate_nothing_to_sequence() {
        let mut r = rule(vec![]);
        r.is_sequential = true;
        assert_eq!(violation(r.validate()), RuleViolation::NothingToSequence);
    }

    #[test]
    fn test_validate_duplicate_approver() {
        let a = UserId::new();
        let r = rule(vec![RuleApprover::required(a), RuleApprover::optional(a)]);
        assert_eq!(violation(r.validate()), RuleViolation::DuplicateApprover(a));
    }

    #[test]
    fn test_validate_percentage_range() {
        let mut r = rule(vec![RuleApprover::optional(UserId::new())]);
        r.minimum_approval_percentage = Some(0);
        assert_eq!(
            violation(r.validate()),
            RuleViolation::PercentageOutOfRange(0)
        );

        r.minimum_approval_percentage = Some(101);
        assert_eq!(
            violation(r.validate()),
            RuleViolation::PercentageOutOfRange(101)
        );

        r.minimum_approval_percentage = Some(100);
        assert!(r.validate().is_ok());

        r.minimum_approval_percentage = Some(1);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_checked_percentage() {
        assert_eq!(checked_percentage(60), Ok(60));
        assert_eq!(checked_percentage(100), Ok(100));
        assert_eq!(
            checked_percentage(0),
            Err(RuleViolation::PercentageOutOfRange(0))
        );
        assert_eq!(
            checked_percentage(-5),
            Err(RuleViolation::PercentageOutOfRange(-5))
        );
        assert_eq!(
            checked_percentage(300),
            Err(RuleViolation::PercentageOutOfRange(300))
        );
    }

    #[test]
    fn test_validate_parallel_all_optional_ok() {
        let r = rule(vec![
            RuleApprover::optional(UserId::new()),
            RuleApprover::optional(UserId::new()),
        ]);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_parallel_all_optional_approves_on_submission() {
        let (a, b) = (UserId::new(), UserId::new());
        let r = rule(vec![RuleApprover::optional(a), RuleApprover::optional(b)]);
        let snapshot = r.snapshot(UserId::new(), None, Utc::now()).unwrap();

        let ledger = ApprovalLedger::new(expensa_shared::types::ExpenseId::new());
        assert_eq!(snapshot.evaluate(&ledger), Evaluation::approved());
    }

    #[test]
    fn test_validate_sequential_all_optional_ok() {
        let mut r = rule(vec![RuleApprover::optional(UserId::new())]);
        r.is_sequential = true;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_resolve_prepends_manager() {
        let owner = UserId::new();
        let manager = UserId::new();
        let finance = UserId::new();
        let mut r = rule(vec![RuleApprover::required(finance)]);
        r.is_manager_approver = true;
        r.is_sequential = true;

        let resolved = r.resolve_approvers(owner, Some(manager)).unwrap();
        assert_eq!(
            resolved,
            vec![RuleApprover::required(manager), RuleApprover::required(finance)]
        );
    }

    #[test]
    fn test_resolve_keeps_listed_order() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let r = rule(vec![
            RuleApprover::optional(a),
            RuleApprover::required(b),
            RuleApprover::optional(c),
        ]);
        let resolved = r.resolve_approvers(UserId::new(), None).unwrap();
        let ids: Vec<_> = resolved.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_resolve_manager_missing() {
        let owner = UserId::new();
        let mut r = rule(vec![]);
        r.is_manager_approver = true;
        assert!(matches!(
            r.resolve_approvers(owner, None),
            Err(ApprovalError::ManagerNotAssigned { owner_id }) if owner_id == owner
        ));
    }

    #[test]
    fn test_resolve_manager_also_listed_keeps_first_slot() {
        let manager = UserId::new();
        let other = UserId::new();
        let mut r = rule(vec![RuleApprover::optional(other), RuleApprover::optional(manager)]);
        r.is_manager_approver = true;

        let resolved = r.resolve_approvers(UserId::new(), Some(manager)).unwrap();
        assert_eq!(
            resolved,
            vec![RuleApprover::required(manager), RuleApprover::optional(other)]
        );
    }

    #[test]
    fn test_resolve_drops_owner() {
        let owner = UserId::new();
        let other = UserId::new();
        let r = rule(vec![RuleApprover::required(owner), RuleApprover::required(other)]);
        let resolved = r.resolve_approvers(owner, None).unwrap();
        assert_eq!(resolved, vec![RuleApprover::required(other)]);
    }

    #[test]
    fn test_resolve_owner_only_approver() {
        let owner = UserId::new();
        let r = rule(vec![RuleApprover::required(owner)]);
        assert!(matches!(
            r.resolve_approvers(owner, None),
            Err(ApprovalError::NoEligibleApprovers { .. })
        ));
    }

    #[test]
    fn test_resolve_parallel_left_without_required() {
        let owner = UserId::new();
        let r = rule(vec![
            RuleApprover::required(owner),
            RuleApprover::optional(UserId::new()),
        ]);
        assert!(matches!(
            r.resolve_approvers(owner, None),
            Err(ApprovalError::NoEligibleApprovers { .. })
        ));
    }

    #[test]
    fn test_snapshot_validates_first() {
        let r = rule(vec![]);
        assert!(matches!(
            r.snapshot(UserId::new(), None, Utc::now()),
            Err(ApprovalError::InvalidRule(RuleViolation::NoApprovers))
        ));
    }

    #[test]
    fn test_snapshot_contents() {
        let owner = UserId::new();
        let a = UserId::new();
        let r = rule(vec![RuleApprover::required(a)]);
        let snapshot = r.snapshot(owner, None, Utc::now()).unwrap();
        assert_eq!(snapshot.rule, r);
        assert_eq!(snapshot.owner_id, owner);
        assert!(snapshot.is_approver(a));
        assert!(!snapshot.is_approver(owner));
        assert_eq!(snapshot.approvers, vec![RuleApprover::required(a)]);
    }
}
