//! Processed billing webhook events, for idempotent delivery handling.

use sqlx::PgPool;

use crate::DbError;

/// Whether `event_id` has already been applied.
pub async fn is_event_processed(pool: &PgPool, event_id: &str) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM processed_billing_events WHERE event_id = $1)",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Record `event_id` as applied. Recording the same event twice is a no-op.
pub async fn mark_event_processed(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO processed_billing_events (event_id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(event_type)
    .execute(pool)
    .await?;

    Ok(())
}
