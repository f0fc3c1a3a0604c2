//! Workflow CRUD operations, always scoped to the owning user.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowRow};

/// Insert a new, inactive workflow.
///
/// `definition` must be a valid JSON object produced by serialising the
/// `WorkflowDefinition` type from the `workflows` crate.
pub async fn create_workflow(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        INSERT INTO workflows (id, user_id, name, definition, active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $5)
        RETURNING id, user_id, name, definition, active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(definition)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow owned by `user_id`.
pub async fn get_workflow(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, user_id, name, definition, active, created_at, updated_at
        FROM workflows WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return the user's workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool, user_id: Uuid) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, user_id, name, definition, active, created_at, updated_at
        FROM workflows WHERE user_id = $1 ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Flip the `active` flag. Returns `DbError::NotFound` if no row matched.
pub async fn set_active(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    active: bool,
) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        UPDATE workflows SET active = $1, updated_at = $2
        WHERE id = $3 AND user_id = $4
        RETURNING id, user_id, name, definition, active, created_at, updated_at
        "#,
    )
    .bind(active)
    .bind(Utc::now())
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Permanently delete a workflow.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflows WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Number of workflows owned by `user_id`.
pub async fn count_workflows(pool: &PgPool, user_id: Uuid) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflows WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
