use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{require, AppState};
use crate::{auth::CurrentUser, error::ApiError};
use db::models::{ExecutionStatus, WorkflowExecutionRow};
use db::repository::{executions as exec_repo, workflows as wf_repo};
use entitlements::Entitlement;

#[derive(Deserialize)]
pub struct ExecuteWorkflowDto {
    #[serde(default)]
    pub input: Value,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusDto {
    pub status: String,
}

/// Record a run request for the provider to pick up.
///
/// Gated on execution access and the monthly run ceiling, both checked
/// before anything is written.
pub async fn execute(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<(StatusCode, Json<WorkflowExecutionRow>), ApiError> {
    require(&state.gate, user_id, Entitlement::AllowWorkflowExecution).await?;
    require(&state.gate, user_id, Entitlement::MaxRunsPerMonth).await?;

    let workflow = wf_repo::get_workflow(&state.pool, user_id, id).await?;
    if !workflow.active {
        return Err(ApiError::Conflict("Workflow is not active. Activate it before running.".into()));
    }

    let input = if payload.input.is_null() { serde_json::json!({}) } else { payload.input };
    let exec = exec_repo::create_execution(&state.pool, user_id, id, input).await?;
    info!(%user_id, workflow_id = %id, execution_id = %exec.id, "execution queued");

    Ok((StatusCode::ACCEPTED, Json(exec)))
}

pub async fn list(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowExecutionRow>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(exec_repo::list_executions(&state.pool, user_id, id, limit).await?))
}

/// Status report from the workflow provider for a run this user owns.
pub async fn report_status(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<StatusDto>,
) -> Result<StatusCode, ApiError> {
    let status: ExecutionStatus = payload.status.parse().map_err(ApiError::BadRequest)?;
    exec_repo::update_execution_status(&state.pool, user_id, id, status).await?;
    Ok(StatusCode::NO_CONTENT)
}
