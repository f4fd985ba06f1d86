//! Approver work queue.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use expensa_db::repositories::ExpenseRepository;
use expensa_shared::types::PageRequest;

/// Creates the approval queue routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/approvals/pending", get(list_pending))
}

/// GET `/approvals/pending` - Expenses currently waiting on the caller.
async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> Response {
    let repo = ExpenseRepository::new((*state.db).clone());

    match repo.pending_for_approver(auth.user_id(), &page).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => {
            error!(approver_id = %auth.user_id(), error = %e, "Failed to load pending approvals");
            ApiError::from(e).into_response()
        }
    }
}
