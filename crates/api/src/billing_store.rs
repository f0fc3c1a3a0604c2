//! Persistence seam for the billing webhook.
//!
//! The webhook only needs four operations: the processed-event ledger, two
//! user lookups, and the subscription write. [`PgBillingStore`] maps them onto
//! the `db` repositories; [`MemoryBillingStore`] keeps them in memory for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use db::models::{SubscriptionUpdate, UserRow};
use db::repository::{billing_events, users};
use db::{DbError, DbPool};

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn is_event_processed(&self, event_id: &str) -> Result<bool, DbError>;

    /// Recording an already recorded event is a no-op.
    async fn mark_event_processed(&self, event_id: &str, event_type: &str) -> Result<(), DbError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRow>, DbError>;

    async fn find_by_customer(&self, customer_id: &str) -> Result<Option<UserRow>, DbError>;

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct PgBillingStore {
    pool: DbPool,
}

impl PgBillingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn is_event_processed(&self, event_id: &str) -> Result<bool, DbError> {
        billing_events::is_event_processed(&self.pool, event_id).await
    }

    async fn mark_event_processed(&self, event_id: &str, event_type: &str) -> Result<(), DbError> {
        billing_events::mark_event_processed(&self.pool, event_id, event_type).await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRow>, DbError> {
        users::get_user(&self.pool, user_id).await
    }

    async fn find_by_customer(&self, customer_id: &str) -> Result<Option<UserRow>, DbError> {
        users::find_by_stripe_customer(&self.pool, customer_id).await
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> Result<(), DbError> {
        users::update_subscription(&self.pool, user_id, update).await
    }
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, UserRow>,
    processed: HashMap<String, String>,
    updates: usize,
}

/// In-memory [`BillingStore`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBillingStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&self, user: UserRow) {
        self.inner.lock().unwrap().users.insert(user.id, user);
    }

    pub fn user(&self, user_id: Uuid) -> Option<UserRow> {
        self.inner.lock().unwrap().users.get(&user_id).cloned()
    }

    /// How many subscription writes have been applied.
    pub fn update_count(&self) -> usize {
        self.inner.lock().unwrap().updates
    }

    pub fn processed_type(&self, event_id: &str) -> Option<String> {
        self.inner.lock().unwrap().processed.get(event_id).cloned()
    }
}

#[async_trait]
impl BillingStore for MemoryBillingStore {
    async fn is_event_processed(&self, event_id: &str) -> Result<bool, DbError> {
        Ok(self.inner.lock().unwrap().processed.contains_key(event_id))
    }

    async fn mark_event_processed(&self, event_id: &str, event_type: &str) -> Result<(), DbError> {
        self.inner
            .lock()
            .unwrap()
            .processed
            .entry(event_id.to_owned())
            .or_insert_with(|| event_type.to_owned());
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRow>, DbError> {
        Ok(self.user(user_id))
    }

    async fn find_by_customer(&self, customer_id: &str) -> Result<Option<UserRow>, DbError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&user_id).ok_or(DbError::NotFound)?;
        user.subscription_plan = update.plan.clone();
        user.subscription_status = update.status.clone();
        user.trial_ends_at = update.trial_ends_at;
        user.subscription_renews_at = update.renews_at;
        user.cancel_at_period_end = update.cancel_at_period_end;
        if let Some(customer) = &update.stripe_customer_id {
            user.stripe_customer_id = Some(customer.clone());
        }
        inner.updates += 1;
        Ok(())
    }
}
