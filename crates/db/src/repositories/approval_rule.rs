//! Approval Rule Repository
//!
//! Provides CRUD operations for approval rules. Every write is validated by
//! the core rule model before it reaches the database.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use expensa_core::approval::{ApprovalError, ApprovalRule, RuleApprover, checked_percentage};
use expensa_shared::types::ApprovalRuleId;

use crate::entities::{approval_rule_approvers, approval_rules};
use crate::convert::rule_from_models;
use crate::retry::map_db_err;

use super::user::missing_user_ids;

/// Input for creating an approval rule.
#[derive(Debug, Clone)]
pub struct CreateApprovalRuleInput {
    /// Name of the approval rule.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Insert the owner's manager as first approver.
    pub is_manager_approver: bool,
    /// Explicit approvers in order.
    pub approvers: Vec<RuleApprover>,
    /// Approvers act in order.
    pub is_sequential: bool,
    /// Raw threshold as submitted; checked against `1..=100`.
    pub minimum_approval_percentage: Option<i64>,
}

/// Input for updating an approval rule.
#[derive(Debug, Clone, Default)]
pub struct UpdateApprovalRuleInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New manager toggle.
    pub is_manager_approver: Option<bool>,
    /// Replacement approver list.
    pub approvers: Option<Vec<RuleApprover>>,
    /// New ordering mode.
    pub is_sequential: Option<bool>,
    /// New threshold; `Some(None)` clears it.
    pub minimum_approval_percentage: Option<Option<i64>>,
    /// Active status.
    pub is_active: Option<bool>,
}

/// An approval rule as stored, with bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRule {
    /// The rule itself.
    #[serde(flatten)]
    pub rule: ApprovalRule,
    /// False once soft deleted.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Repository for approval rule operations.
#[derive(Debug, Clone)]
pub struct ApprovalRuleRepository {
    db: DatabaseConnection,
}

impl ApprovalRuleRepository {
    /// Creates a new ApprovalRuleRepository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a new approval rule.
    ///
    /// # Errors
    ///
    /// - `InvalidRule` if the rule fails validation
    /// - `UserNotFound` if an approver does not exist
    /// - `Database` on storage failure
    pub async fn create_rule(
        &self,
        input: CreateApprovalRuleInput,
    ) -> Result<StoredRule, ApprovalError> {
        let rule = ApprovalRule {
            id: ApprovalRuleId::new(),
            name: input.name.trim().to_string(),
            description: normalize_description(input.description),
            is_manager_approver: input.is_manager_approver,
            approvers: input.approvers,
            is_sequential: input.is_sequential,
            minimum_approval_percentage: input
                .minimum_approval_percentage
                .map(checked_percentage)
                .transpose()?,
        };
        rule.validate()?;
        self.ensure_approvers_exist(&rule.approvers).await?;

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(map_db_err)?;

        approval_rules::ActiveModel {
            id: Set(rule.id.into()),
            name: Set(rule.name.clone()),
            description: Set(rule.description.clone()),
            is_manager_approver: Set(rule.is_manager_approver),
            is_sequential: Set(rule.is_sequential),
            minimum_approval_percentage: Set(rule.minimum_approval_percentage.map(i16::from)),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(map_db_err)?;

        insert_approvers(&txn, rule.id, &rule.approvers).await?;

        txn.commit().await.map_err(map_db_err)?;

        info!(rule_id = %rule.id, name = %rule.name, "Approval rule created");

        Ok(StoredRule {
            rule,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Lists all active approval rules ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_rules(&self) -> Result<Vec<StoredRule>, ApprovalError> {
        let rules = approval_rules::Entity::find()
            .filter(approval_rules::Column::IsActive.eq(true))
            .order_by_asc(approval_rules::Column::Name)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let mut approvers_by_rule: HashMap<Uuid, Vec<approval_rule_approvers::Model>> =
            HashMap::new();
        if !rules.is_empty() {
            let approvers = approval_rule_approvers::Entity::find()
                .filter(approval_rule_approvers::Column::RuleId.is_in(rules.iter().map(|r| r.id)))
                .all(&self.db)
                .await
                .map_err(map_db_err)?;
            for approver in approvers {
                approvers_by_rule
                    .entry(approver.rule_id)
                    .or_default()
                    .push(approver);
            }
        }

        Ok(rules
            .into_iter()
            .map(|rule| {
                let approvers = approvers_by_rule.remove(&rule.id).unwrap_or_default();
                stored_rule(rule, approvers)
            })
            .collect())
    }

    /// Gets a specific approval rule by ID, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// - `RuleNotFound` if no rule has this ID
    /// - `Database` on storage failure
    pub async fn get_rule(&self, rule_id: ApprovalRuleId) -> Result<StoredRule, ApprovalError> {
        load_rule(&self.db, rule_id).await
    }

    /// Updates an approval rule and re-validates the result.
    ///
    /// Expenses already submitted keep the snapshot taken at submission.
    ///
    /// # Errors
    ///
    /// - `RuleNotFound` if no rule has this ID
    /// - `InvalidRule` if the updated rule fails validation
    /// - `UserNotFound` if a new approver does not exist
    /// - `Database` on storage failure
    pub async fn update_rule(
        &self,
        rule_id: ApprovalRuleId,
        input: UpdateApprovalRuleInput,
    ) -> Result<StoredRule, ApprovalError> {
        let existing = self.get_rule(rule_id).await?;
        let mut rule = existing.rule;

        if let Some(name) = input.name {
            rule.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            rule.description = normalize_description(description);
        }
        if let Some(is_manager_approver) = input.is_manager_approver {
            rule.is_manager_approver = is_manager_approver;
        }
        if let Some(is_sequential) = input.is_sequential {
            rule.is_sequential = is_sequential;
        }
        if let Some(pct) = input.minimum_approval_percentage {
            rule.minimum_approval_percentage = pct.map(checked_percentage).transpose()?;
        }
        let approvers_changed = input.approvers.is_some();
        if let Some(approvers) = input.approvers {
            rule.approvers = approvers;
        }
        let is_active = input.is_active.unwrap_or(existing.is_active);

        rule.validate()?;
        if approvers_changed {
            self.ensure_approvers_exist(&rule.approvers).await?;
        }

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(map_db_err)?;

        approval_rules::ActiveModel {
            id: Set(rule.id.into()),
            name: Set(rule.name.clone()),
            description: Set(rule.description.clone()),
            is_manager_approver: Set(rule.is_manager_approver),
            is_sequential: Set(rule.is_sequential),
            minimum_approval_percentage: Set(rule.minimum_approval_percentage.map(i16::from)),
            is_active: Set(is_active),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(map_db_err)?;

        if approvers_changed {
            approval_rule_approvers::Entity::delete_many()
                .filter(approval_rule_approvers::Column::RuleId.eq(Uuid::from(rule.id)))
                .exec(&txn)
                .await
                .map_err(map_db_err)?;
            insert_approvers(&txn, rule.id, &rule.approvers).await?;
        }

        txn.commit().await.map_err(map_db_err)?;

        info!(rule_id = %rule.id, approvers_changed, "Approval rule updated");

        Ok(StoredRule {
            rule,
            is_active,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Soft deletes an approval rule by setting is_active to false.
    ///
    /// # Errors
    ///
    /// - `RuleNotFound` if no rule has this ID
    /// - `Database` on storage failure
    pub async fn delete_rule(&self, rule_id: ApprovalRuleId) -> Result<(), ApprovalError> {
        let existing = approval_rules::Entity::find_by_id(Uuid::from(rule_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(ApprovalError::RuleNotFound(rule_id))?;

        let mut rule: approval_rules::ActiveModel = existing.into();
        rule.is_active = Set(false);
        rule.updated_at = Set(Utc::now().into());

        rule.update(&self.db).await.map_err(map_db_err)?;

        info!(rule_id = %rule_id, "Approval rule deactivated");
        Ok(())
    }

    async fn ensure_approvers_exist(&self, approvers: &[RuleApprover]) -> Result<(), ApprovalError> {
        let ids: Vec<_> = approvers.iter().map(|a| a.user_id).collect();
        let missing = missing_user_ids(&self.db, &ids).await.map_err(map_db_err)?;
        match missing.first() {
            Some(id) => Err(ApprovalError::UserNotFound(*id)),
            None => Ok(()),
        }
    }
}

/// Loads a rule and its approvers.
pub(crate) async fn load_rule<C: ConnectionTrait>(
    db: &C,
    rule_id: ApprovalRuleId,
) -> Result<StoredRule, ApprovalError> {
    let rule = approval_rules::Entity::find_by_id(Uuid::from(rule_id))
        .one(db)
        .await
        .map_err(map_db_err)?
        .ok_or(ApprovalError::RuleNotFound(rule_id))?;

    let approvers = approval_rule_approvers::Entity::find()
        .filter(approval_rule_approvers::Column::RuleId.eq(rule.id))
        .order_by_asc(approval_rule_approvers::Column::Position)
        .all(db)
        .await
        .map_err(map_db_err)?;

    Ok(stored_rule(rule, approvers))
}

fn stored_rule(
    rule: approval_rules::Model,
    approvers: Vec<approval_rule_approvers::Model>,
) -> StoredRule {
    let is_active = rule.is_active;
    let created_at = rule.created_at.into();
    let updated_at = rule.updated_at.into();
    StoredRule {
        rule: rule_from_models(rule, approvers),
        is_active,
        created_at,
        updated_at,
    }
}

async fn insert_approvers<C: ConnectionTrait>(
    db: &C,
    rule_id: ApprovalRuleId,
    approvers: &[RuleApprover],
) -> Result<(), ApprovalError> {
    if approvers.is_empty() {
        return Ok(());
    }

    let rows = approvers
        .iter()
        .enumerate()
        .map(|(idx, approver)| {
            let position = i16::try_from(idx)
                .map_err(|_| ApprovalError::Database("too many approvers".to_string()))?;
            Ok(approval_rule_approvers::ActiveModel {
                id: Set(Uuid::now_v7()),
                rule_id: Set(rule_id.into()),
                user_id: Set(approver.user_id.into()),
                position: Set(position),
                is_required: Set(approver.is_required),
            })
        })
        .collect::<Result<Vec<_>, ApprovalError>>()?;

    approval_rule_approvers::Entity::insert_many(rows)
        .exec(db)
        .await
        .map_err(map_db_err)?;
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description(None), None);
        assert_eq!(normalize_description(Some("  ".into())), None);
        assert_eq!(
            normalize_description(Some(" Manager then finance ".into())),
            Some("Manager then finance".to_string())
        );
    }

    #[test]
    fn test_stored_rule_serializes_flat() {
        let now = Utc::now();
        let stored = StoredRule {
            rule: ApprovalRule {
                id: ApprovalRuleId::new(),
                name: "Project Team Approvals (Parallel)".to_string(),
                description: None,
                is_manager_approver: false,
                approvers: vec![],
                is_sequential: false,
                minimum_approval_percentage: Some(60),
            },
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["name"], "Project Team Approvals (Parallel)");
        assert_eq!(json["minimum_approval_percentage"], 60);
        assert_eq!(json["is_active"], true);
    }
}
