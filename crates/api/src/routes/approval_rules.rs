//! Approval rule management routes.
//!
//! Anyone signed in can read rules; only admins can change them. Edits never
//! reach expenses that were already submitted, because those carry their own
//! snapshot of the rule.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_core::approval::RuleApprover;
use expensa_db::repositories::{
    ApprovalRuleRepository, CreateApprovalRuleInput, UpdateApprovalRuleInput,
};
use expensa_shared::AppError;
use expensa_shared::types::ApprovalRuleId;

/// Creates the approval rules routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/approval-rules",
            get(list_approval_rules).post(create_approval_rule),
        )
        .route(
            "/approval-rules/{rule_id}",
            get(get_approval_rule)
                .patch(update_approval_rule)
                .delete(delete_approval_rule),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for creating an approval rule.
#[derive(Debug, Deserialize)]
pub struct CreateApprovalRuleRequest {
    /// Name of the approval rule.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Put the submitter's manager first in line.
    #[serde(default)]
    pub is_manager_approver: bool,
    /// Explicit approvers, in order.
    #[serde(default)]
    pub approvers: Vec<RuleApprover>,
    /// Approvers act one after another.
    #[serde(default)]
    pub is_sequential: bool,
    /// Percentage of approvers needed, 1 to 100.
    #[serde(default)]
    pub minimum_approval_percentage: Option<i64>,
}

/// Request body for updating an approval rule.
///
/// Absent fields are left alone; `null` clears `description` and
/// `minimum_approval_percentage`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApprovalRuleRequest {
    /// New name.
    pub name: Option<String>,
    /// New description.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    /// New manager toggle.
    pub is_manager_approver: Option<bool>,
    /// Replacement approver list.
    pub approvers: Option<Vec<RuleApprover>>,
    /// New ordering mode.
    pub is_sequential: Option<bool>,
    /// New threshold.
    #[serde(default, deserialize_with = "present")]
    pub minimum_approval_percentage: Option<Option<i64>>,
    /// Active status.
    pub is_active: Option<bool>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<CreateApprovalRuleRequest> for CreateApprovalRuleInput {
    fn from(req: CreateApprovalRuleRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            is_manager_approver: req.is_manager_approver,
            approvers: req.approvers,
            is_sequential: req.is_sequential,
            minimum_approval_percentage: req.minimum_approval_percentage,
        }
    }
}

impl From<UpdateApprovalRuleRequest> for UpdateApprovalRuleInput {
    fn from(req: UpdateApprovalRuleRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            is_manager_approver: req.is_manager_approver,
            approvers: req.approvers,
            is_sequential: req.is_sequential,
            minimum_approval_percentage: req.minimum_approval_percentage,
            is_active: req.is_active,
        }
    }
}

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.can_manage_rules() {
        Ok(())
    } else {
        Err(AppError::Forbidden("only admins can manage approval rules".to_string()).into())
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/approval-rules` - List active approval rules.
async fn list_approval_rules(State(state): State<AppState>, _auth: AuthUser) -> Response {
    let repo = ApprovalRuleRepository::new((*state.db).clone());

    match repo.list_rules().await {
        Ok(rules) => (StatusCode::OK, Json(json!({ "data": rules }))).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list approval rules");
            ApiError::from(e).into_response()
        }
    }
}

/// POST `/approval-rules` - Create approval rule.
async fn create_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateApprovalRuleRequest>,
) -> Response {
    if let Err(e) = require_admin(&auth) {
        return e.into_response();
    }

    let repo = ApprovalRuleRepository::new((*state.db).clone());

    match repo.create_rule(payload.into()).await {
        Ok(rule) => {
            info!(rule_id = %rule.rule.id, created_by = %auth.user_id(), "Approval rule created via API");
            (StatusCode::CREATED, Json(rule)).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET `/approval-rules/{rule_id}` - Get approval rule.
async fn get_approval_rule(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Response {
    let repo = ApprovalRuleRepository::new((*state.db).clone());

    match repo.get_rule(ApprovalRuleId::from(rule_id)).await {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// PATCH `/approval-rules/{rule_id}` - Update approval rule.
async fn update_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateApprovalRuleRequest>,
) -> Response {
    if let Err(e) = require_admin(&auth) {
        return e.into_response();
    }

    let repo = ApprovalRuleRepository::new((*state.db).clone());

    match repo
        .update_rule(ApprovalRuleId::from(rule_id), payload.into())
        .await
    {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// DELETE `/approval-rules/{rule_id}` - Deactivate approval rule.
async fn delete_approval_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(rule_id): Path<Uuid>,
) -> Response {
    if let Err(e) = require_admin(&auth) {
        return e.into_response();
    }

    let repo = ApprovalRuleRepository::new((*state.db).clone());

    match repo.delete_rule(ApprovalRuleId::from(rule_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_missing() {
        let req: UpdateApprovalRuleRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(req.description, Some(None));
        assert_eq!(req.minimum_approval_percentage, None);

        let req: UpdateApprovalRuleRequest =
            serde_json::from_str(r#"{"minimum_approval_percentage": 60}"#).unwrap();
        assert_eq!(req.minimum_approval_percentage, Some(Some(60)));
        assert_eq!(req.description, None);
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateApprovalRuleRequest = serde_json::from_str(
            r#"{
                "name": "Project Team Approvals (Parallel)",
                "approvers": [
                    {"user_id": "0190f0c4-8a3b-7c1e-9a2d-3b4c5d6e7f80", "is_required": true}
                ]
            }"#,
        )
        .unwrap();

        let input = CreateApprovalRuleInput::from(req);
        assert!(!input.is_manager_approver);
        assert!(!input.is_sequential);
        assert_eq!(input.approvers.len(), 1);
        assert!(input.approvers[0].is_required);
        assert_eq!(input.minimum_approval_percentage, None);
    }
}
