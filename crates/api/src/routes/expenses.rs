//! Expense submission, lookup and decision routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_core::approval::{Decision, ExpenseStatus};
use expensa_core::expense::{Expense, NewExpense};
use expensa_core::identity::UserRole;
use expensa_db::repositories::{ApprovalRepository, ExpenseRepository};
use expensa_shared::AppError;
use expensa_shared::types::{ApprovalRuleId, ExpenseId, PageRequest, UserId};

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", post(create_expense).get(list_expenses))
        .route("/expenses/{expense_id}", get(get_expense))
        .route("/expenses/{expense_id}/decisions", post(submit_decision))
        .route("/expenses/{expense_id}/approval", get(get_approval_status))
}

/// Request body for submitting an expense.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    /// Rule that decides who approves this expense.
    pub rule_id: Uuid,
    /// Amount, as a decimal string or number.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Expense category.
    pub category: String,
    /// What the money was spent on.
    pub description: String,
    /// Date of the expense.
    pub date: NaiveDate,
}

impl CreateExpenseRequest {
    fn into_parts(self) -> (ApprovalRuleId, NewExpense) {
        (
            ApprovalRuleId::from(self.rule_id),
            NewExpense {
                amount: self.amount,
                currency: self.currency,
                category: self.category,
                description: self.description,
                date: self.date,
            },
        )
    }
}

/// Request body for a decision.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// `approve` or `reject`.
    pub decision: Decision,
    /// Optional note for the submitter.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Response for a recorded decision.
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    /// Status after the decision.
    pub status: ExpenseStatus,
    /// Approvers whose action is now awaited.
    pub next_required: Vec<UserId>,
}

/// Owner, admins and anyone on the expense's approver list may look at it.
fn can_view(auth: &AuthUser, expense: &Expense) -> bool {
    let user_id = auth.user_id();
    expense.owner_id == user_id
        || auth.role() == Some(UserRole::Admin)
        || expense.rule_snapshot.is_approver(user_id)
}

async fn load_visible_expense(
    state: &AppState,
    auth: &AuthUser,
    expense_id: ExpenseId,
) -> Result<Expense, ApiError> {
    let expense = ExpenseRepository::new((*state.db).clone())
        .get_expense(expense_id)
        .await?;

    if can_view(auth, &expense) {
        Ok(expense)
    } else {
        Err(AppError::Forbidden("you do not have access to this expense".to_string()).into())
    }
}

/// POST `/expenses` - Submit an expense under an approval rule.
async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Response {
    let repo = ExpenseRepository::new((*state.db).clone());
    let (rule_id, input) = payload.into_parts();

    match repo.create_expense(auth.user_id(), rule_id, input).await {
        Ok(expense) => (StatusCode::CREATED, Json(expense)).into_response(),
        Err(e) => {
            warn!(owner_id = %auth.user_id(), rule_id = %rule_id, error = %e, "Expense submission refused");
            ApiError::from(e).into_response()
        }
    }
}

/// GET `/expenses` - List the caller's own expenses.
async fn list_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> Response {
    let repo = ExpenseRepository::new((*state.db).clone());

    match repo.list_expenses(auth.user_id(), &page).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET `/expenses/{expense_id}` - Get one expense.
async fn get_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Response {
    match load_visible_expense(&state, &auth, ExpenseId::from(expense_id)).await {
        Ok(expense) => (StatusCode::OK, Json(expense)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST `/expenses/{expense_id}/decisions` - Approve or reject as the caller.
async fn submit_decision(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> Response {
    let repo = ApprovalRepository::new((*state.db).clone(), state.retry);

    match repo
        .submit_decision(
            ExpenseId::from(expense_id),
            auth.user_id(),
            payload.decision,
            payload.comment,
        )
        .await
    {
        Ok(outcome) => {
            if outcome.is_transition() {
                info!(
                    expense_id = %expense_id,
                    from = %outcome.previous_status,
                    to = %outcome.evaluation.status,
                    "Expense status changed"
                );
            }
            (
                StatusCode::OK,
                Json(DecisionResponse {
                    status: outcome.evaluation.status,
                    next_required: outcome.evaluation.next_required,
                }),
            )
                .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET `/expenses/{expense_id}/approval` - Current status and decisions.
async fn get_approval_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Response {
    let expense_id = ExpenseId::from(expense_id);
    if let Err(e) = load_visible_expense(&state, &auth, expense_id).await {
        return e.into_response();
    }

    let repo = ApprovalRepository::new((*state.db).clone(), state.retry);

    match repo.query_status(expense_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
