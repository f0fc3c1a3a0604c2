//! Postgres-backed [`EntitlementStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use db::{models::UserRow, repository, DbPool};
use entitlements::{EntitlementError, EntitlementStore, SubscriptionState, SubscriptionStatus};

/// Reads subscription state and usage straight from the database on every call.
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: DbPool,
}

impl PgEntitlementStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Project the subscription columns of a user row.
pub fn subscription_state(user: UserRow) -> SubscriptionState {
    SubscriptionState {
        status: SubscriptionStatus::from_stored(user.subscription_status.as_deref()),
        plan: user.subscription_plan,
        trial_ends_at: user.trial_ends_at,
        renews_at: user.subscription_renews_at,
        cancel_at_period_end: user.cancel_at_period_end,
    }
}

fn store_error(err: db::DbError) -> EntitlementError {
    EntitlementError::Store(anyhow::Error::new(err))
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    async fn get_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionState>, EntitlementError> {
        let user = repository::users::get_user(&self.pool, user_id)
            .await
            .map_err(store_error)?;
        Ok(user.map(subscription_state))
    }

    async fn count_workflows(&self, user_id: Uuid) -> Result<u64, EntitlementError> {
        let count = repository::workflows::count_workflows(&self.pool, user_id)
            .await
            .map_err(store_error)?;
        Ok(count.max(0) as u64)
    }

    async fn count_executions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, EntitlementError> {
        let count = repository::executions::count_executions_since(&self.pool, user_id, since)
            .await
            .map_err(store_error)?;
        Ok(count.max(0) as u64)
    }
}
