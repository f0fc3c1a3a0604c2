//! `MockStore` — an in-memory `EntitlementStore` for tests.
//!
//! Lets the gate and the HTTP layer be exercised without Postgres.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EntitlementError, EntitlementStore, SubscriptionState};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, SubscriptionState>,
    workflows: HashMap<Uuid, u64>,
    executions: HashMap<Uuid, Vec<DateTime<Utc>>>,
    reads: usize,
    failing: bool,
}

/// In-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user's subscription.
    pub fn put_user(&self, user_id: Uuid, state: SubscriptionState) {
        self.inner.lock().unwrap().users.insert(user_id, state);
    }

    pub fn set_workflow_count(&self, user_id: Uuid, count: u64) {
        self.inner.lock().unwrap().workflows.insert(user_id, count);
    }

    /// Record an execution started at `at`.
    pub fn record_execution(&self, user_id: Uuid, at: DateTime<Utc>) {
        self.inner.lock().unwrap().executions.entry(user_id).or_default().push(at);
    }

    /// Make every subsequent read fail, as if the database were unreachable.
    pub fn fail_reads(&self) {
        self.inner.lock().unwrap().failing = true;
    }

    /// Number of reads served so far.
    pub fn read_count(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, Inner>, EntitlementError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        if inner.failing {
            return Err(anyhow::anyhow!("connection refused").into());
        }
        Ok(inner)
    }
}

#[async_trait]
impl EntitlementStore for MockStore {
    async fn get_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionState>, EntitlementError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn count_workflows(&self, user_id: Uuid) -> Result<u64, EntitlementError> {
        Ok(self.read()?.workflows.get(&user_id).copied().unwrap_or(0))
    }

    async fn count_executions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64, EntitlementError> {
        let inner = self.read()?;
        let count = inner
            .executions
            .get(&user_id)
            .map(|runs| runs.iter().filter(|&&at| at >= since).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}
