//! Execution bookkeeping. The workflow provider runs the workflow; these rows
//! record that a run was requested and how it ended.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{ExecutionStatus, WorkflowExecutionRow},
};

/// Create a new workflow execution record in `pending` status.
pub async fn create_execution(
    pool: &PgPool,
    user_id: Uuid,
    workflow_id: Uuid,
    input: serde_json::Value,
) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowExecutionRow>(
        r#"
        INSERT INTO workflow_executions (id, workflow_id, user_id, status, input, started_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, workflow_id, user_id, status, input, started_at, finished_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(workflow_id)
    .bind(user_id)
    .bind(ExecutionStatus::Pending.as_str())
    .bind(input)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Update the `status` of an execution owned by `user_id`; terminal statuses
/// also stamp `finished_at`.
pub async fn update_execution_status(
    pool: &PgPool,
    user_id: Uuid,
    execution_id: Uuid,
    status: ExecutionStatus,
) -> Result<(), DbError> {
    let finished_at = status.is_terminal().then(Utc::now);

    let result = sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $1, finished_at = COALESCE($2, finished_at)
        WHERE id = $3 AND user_id = $4
        "#,
    )
    .bind(status.as_str())
    .bind(finished_at)
    .bind(execution_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Executions of one workflow, newest first.
pub async fn list_executions(
    pool: &PgPool,
    user_id: Uuid,
    workflow_id: Uuid,
    limit: i64,
) -> Result<Vec<WorkflowExecutionRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowExecutionRow>(
        r#"
        SELECT id, workflow_id, user_id, status, input, started_at, finished_at
        FROM workflow_executions
        WHERE user_id = $1 AND workflow_id = $2
        ORDER BY started_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(workflow_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of executions `user_id` started at or after `since`.
pub async fn count_executions_since(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workflow_executions WHERE user_id = $1 AND started_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
