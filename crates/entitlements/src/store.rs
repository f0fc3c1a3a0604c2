//! The `EntitlementStore` trait — everything the gate needs from persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EntitlementError, SubscriptionState};

/// Read-only view of the user, workflow and execution tables.
///
/// Implemented over Postgres by the `api` crate and in memory by
/// [`MockStore`](crate::mock::MockStore). Every call must observe the latest
/// committed state; implementations must not cache.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// The user's subscription fields, or `None` if the user does not exist.
    async fn get_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionState>, EntitlementError>;

    /// Number of workflows owned by the user.
    async fn count_workflows(&self, user_id: Uuid) -> Result<u64, EntitlementError>;

    /// Number of executions the user started at or after `since`.
    async fn count_executions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, EntitlementError>;
}
