//! Request handlers and the state they share.

pub mod billing;
pub mod entitlements;
pub mod executions;
pub mod workflows;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use ::entitlements::{Entitlement, EntitlementCheck, EntitlementPolicy, Gatekeeper};
use db::DbPool;

use crate::billing_store::{BillingStore, PgBillingStore};
use crate::error::ApiError;
use crate::store::PgEntitlementStore;

/// Shared application state. Constructed once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub gate: Gatekeeper,
    pub billing: Arc<dyn BillingStore>,
}

impl AppState {
    /// State whose gate reads from the same Postgres pool as the handlers.
    pub fn new(pool: DbPool, policy: EntitlementPolicy) -> Self {
        let store = Arc::new(PgEntitlementStore::new(pool.clone()));
        Self::with_gate(pool, Gatekeeper::new(store, policy))
    }

    /// State with an explicitly provided gate.
    pub fn with_gate(pool: DbPool, gate: Gatekeeper) -> Self {
        let billing = Arc::new(PgBillingStore::new(pool.clone()));
        Self { pool, gate, billing }
    }

    /// Replace the store the billing webhook writes through.
    pub fn with_billing(mut self, billing: Arc<dyn BillingStore>) -> Self {
        self.billing = billing;
        self
    }
}

/// Re-check `entitlement` for `user_id` and turn a denial into a 403.
pub(crate) async fn require(
    gate: &Gatekeeper,
    user_id: Uuid,
    entitlement: Entitlement,
) -> Result<EntitlementCheck, ApiError> {
    let check = gate.check(user_id, entitlement, Utc::now()).await?;
    if check.allowed {
        return Ok(check);
    }

    let reason = check
        .reason
        .unwrap_or_else(|| format!("Your plan does not include {entitlement}."));
    info!(%user_id, %entitlement, %reason, "request denied by entitlement");
    Err(ApiError::Forbidden(reason))
}
