//! `Gatekeeper` — the per-request entitlement pipeline.
//!
//! For every check it:
//! 1. Reads the user's subscription state from the store.
//! 2. Resolves the effective plan under the configured policy.
//! 3. Counts current usage when the entitlement is countable.
//! 4. Runs the pure resolver.
//!
//! Nothing is cached between calls, so a cancellation or a lapsed trial takes
//! effect on the very next request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::plan::{entitlement_value, EntitlementValue};
use crate::resolver::check_entitlement;
use crate::usage::usage_for;
use crate::{
    Entitlement, EntitlementCheck, EntitlementError, EntitlementPolicy, EntitlementStore, PlanId,
    SubscriptionState, SubscriptionStatus,
};

/// One row of an [`EntitlementSummary`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementStatus {
    pub entitlement: Entitlement,
    pub value: EntitlementValue,
    /// Current usage, for countable entitlements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<u64>,
    #[serde(flatten)]
    pub check: EntitlementCheck,
}

/// Everything a client needs to render a user's plan and limits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSummary {
    pub effective_plan: PlanId,
    pub stored_plan: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub in_trial: bool,
    pub entitlements: Vec<EntitlementStatus>,
}

/// Resolves entitlements for users against an injected store.
#[derive(Clone)]
pub struct Gatekeeper {
    store: Arc<dyn EntitlementStore>,
    policy: EntitlementPolicy,
}

impl Gatekeeper {
    pub fn new(store: Arc<dyn EntitlementStore>, policy: EntitlementPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &EntitlementPolicy {
        &self.policy
    }

    async fn subscription(&self, user_id: Uuid) -> Result<SubscriptionState, EntitlementError> {
        self.store
            .get_subscription(user_id)
            .await?
            .ok_or(EntitlementError::UserNotFound(user_id))
    }

    /// The plan currently applied to `user_id`.
    pub async fn effective_plan(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PlanId, EntitlementError> {
        let state = self.subscription(user_id).await?;
        Ok(self.policy.resolve_effective_plan(&state, now))
    }

    /// Can `user_id` use `entitlement` right now?
    ///
    /// # Errors
    /// [`EntitlementError::UserNotFound`] for unknown users and
    /// [`EntitlementError::Store`] when the store cannot be read. A denial is
    /// an `Ok` result with `allowed == false`.
    #[instrument(skip(self), fields(entitlement = %entitlement))]
    pub async fn check(
        &self,
        user_id: Uuid,
        entitlement: Entitlement,
        now: DateTime<Utc>,
    ) -> Result<EntitlementCheck, EntitlementError> {
        let plan = self.effective_plan(user_id, now).await?;
        let usage = usage_for(self.store.as_ref(), user_id, entitlement, now).await?;
        let check = check_entitlement(plan, entitlement, usage);

        debug!(plan = %plan, ?usage, allowed = check.allowed, "entitlement checked");
        Ok(check)
    }

    /// Resolve every entitlement for `user_id` in one pass.
    pub async fn summary(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EntitlementSummary, EntitlementError> {
        let state = self.subscription(user_id).await?;
        let plan = self.policy.resolve_effective_plan(&state, now);

        let mut entitlements = Vec::with_capacity(Entitlement::ALL.len());
        for entitlement in Entitlement::ALL {
            let usage = usage_for(self.store.as_ref(), user_id, entitlement, now).await?;
            entitlements.push(EntitlementStatus {
                entitlement,
                value: entitlement_value(plan, entitlement),
                usage,
                check: check_entitlement(plan, entitlement, usage),
            });
        }

        Ok(EntitlementSummary {
            effective_plan: plan,
            in_trial: state.in_trial(now),
            stored_plan: state.plan,
            status: state.status,
            trial_ends_at: state.trial_ends_at,
            entitlements,
        })
    }
}
