//! User and subscription-state queries.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{SubscriptionUpdate, UserRow},
};

const USER_COLUMNS: &str = "id, email, subscription_plan, subscription_status, trial_ends_at, \
     subscription_renews_at, cancel_at_period_end, stripe_customer_id, created_at";

/// Insert a new user with no subscription.
pub async fn create_user(pool: &PgPool, email: &str) -> Result<UserRow, DbError> {
    let query = format!(
        "INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
    );

    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .map_err(DbError::from_write)?;

    Ok(row)
}

/// Fetch a user by primary key, or `None` if absent.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, DbError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetch the user linked to a billing-provider customer ID.
pub async fn find_by_stripe_customer(
    pool: &PgPool,
    customer_id: &str,
) -> Result<Option<UserRow>, DbError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE stripe_customer_id = $1");

    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Overwrite the subscription columns of a user.
///
/// `stripe_customer_id` is only written when `update` carries one, so a
/// partial event never unlinks the customer.
///
/// Returns `DbError::NotFound` if no row was updated.
pub async fn update_subscription(
    pool: &PgPool,
    user_id: Uuid,
    update: &SubscriptionUpdate,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_plan = $1,
            subscription_status = $2,
            trial_ends_at = $3,
            subscription_renews_at = $4,
            cancel_at_period_end = $5,
            stripe_customer_id = COALESCE($6, stripe_customer_id)
        WHERE id = $7
        "#,
    )
    .bind(update.plan.as_deref())
    .bind(update.status.as_deref())
    .bind(update.trial_ends_at)
    .bind(update.renews_at)
    .bind(update.cancel_at_period_end)
    .bind(update.stripe_customer_id.as_deref())
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(DbError::from_write)?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
