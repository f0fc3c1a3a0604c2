use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{require, AppState};
use crate::{auth::CurrentUser, error::ApiError};
use db::{models::WorkflowRow, repository::workflows as wf_repo};
use entitlements::Entitlement;
use workflows::{validate_for_activation, WorkflowDefinition};

#[derive(serde::Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    pub definition: Value,
}

pub async fn list(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowRow>>, ApiError> {
    Ok(Json(wf_repo::list_workflows(&state.pool, user_id).await?))
}

pub async fn get(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowRow>, ApiError> {
    Ok(Json(wf_repo::get_workflow(&state.pool, user_id, id).await?))
}

/// Create a workflow, subject to the plan's workflow ceiling.
pub async fn create(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> Result<(StatusCode, Json<WorkflowRow>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Workflow name is required".into()));
    }
    // Must at least parse; full validation happens on activation.
    WorkflowDefinition::from_value(&payload.definition)?;

    require(&state.gate, user_id, Entitlement::MaxActiveWorkflows).await?;

    let row = wf_repo::create_workflow(&state.pool, user_id, payload.name.trim(), payload.definition).await?;
    info!(%user_id, workflow_id = %row.id, "workflow created");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    wf_repo::delete_workflow(&state.pool, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate the stored definition and mark the workflow active.
pub async fn activate(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowRow>, ApiError> {
    let row = wf_repo::get_workflow(&state.pool, user_id, id).await?;
    let definition = WorkflowDefinition::from_value(&row.definition)?;
    validate_for_activation(&row.name, &definition)?;

    let row = wf_repo::set_active(&state.pool, user_id, id, true).await?;
    info!(%user_id, workflow_id = %id, "workflow activated");
    Ok(Json(row))
}

pub async fn deactivate(
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowRow>, ApiError> {
    Ok(Json(wf_repo::set_active(&state.pool, user_id, id, false).await?))
}
