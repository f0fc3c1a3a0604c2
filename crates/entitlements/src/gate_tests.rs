//! End-to-end tests for the gate: store → effective plan → usage → check.
//!
//! These run against `MockStore`, so no Postgres is required.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::mock::MockStore;
use crate::{
    Entitlement, EntitlementError, EntitlementPolicy, EntitlementValue, Gatekeeper, PlanId,
    SubscriptionState, SubscriptionStatus,
};

fn now() -> DateTime<Utc> {
    "2026-05-20T09:30:00Z".parse().unwrap()
}

fn gate(store: &MockStore) -> Gatekeeper {
    Gatekeeper::new(Arc::new(store.clone()), EntitlementPolicy::default())
}

#[tokio::test]
async fn starter_user_at_workflow_limit_is_denied() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("starter", SubscriptionStatus::Active));
    store.set_workflow_count(user, 3);

    let check = gate(&store).check(user, Entitlement::MaxActiveWorkflows, now()).await.unwrap();

    assert!(!check.allowed);
    assert_eq!(check.ceiling, Some(3));
    let reason = check.reason.unwrap();
    assert!(reason.contains("You have 3 workflow(s)"));
    assert!(reason.contains("Maximum allowed: 3"));
}

#[tokio::test]
async fn free_user_in_trial_can_execute_workflows() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(
        user,
        SubscriptionState::new("free", SubscriptionStatus::Trialing)
            .with_trial_ending(now() + Duration::days(2)),
    );

    let gate = gate(&store);
    assert_eq!(gate.effective_plan(user, now()).await.unwrap(), PlanId::Agency);
    assert!(gate.check(user, Entitlement::AllowWorkflowExecution, now()).await.unwrap().allowed);
}

#[tokio::test]
async fn past_due_pro_user_loses_pro_features() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("pro", SubscriptionStatus::PastDue));

    let gate = gate(&store);
    assert_eq!(gate.effective_plan(user, now()).await.unwrap(), PlanId::Free);

    let check = gate.check(user, Entitlement::CustomIntegrations, now()).await.unwrap();
    assert!(!check.allowed);
    assert_eq!(check.reason.as_deref(), Some("Please upgrade to Pro to use custom integrations."));
}

#[tokio::test]
async fn unknown_stored_plan_gets_free_values() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("enterprise_legacy", SubscriptionStatus::Active));

    let summary = gate(&store).summary(user, now()).await.unwrap();

    assert_eq!(summary.effective_plan, PlanId::Free);
    assert_eq!(summary.stored_plan.as_deref(), Some("enterprise_legacy"));
    for status in &summary.entitlements {
        assert_eq!(status.value, crate::entitlement_value(PlanId::Free, status.entitlement));
    }
}

#[tokio::test]
async fn cancellation_takes_effect_on_next_check() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("pro", SubscriptionStatus::Active));
    let gate = gate(&store);

    assert!(gate.check(user, Entitlement::AllowWorkflowExecution, now()).await.unwrap().allowed);

    store.put_user(user, SubscriptionState::new("pro", SubscriptionStatus::Canceled));
    assert!(!gate.check(user, Entitlement::AllowWorkflowExecution, now()).await.unwrap().allowed);
}

#[tokio::test]
async fn trial_expiry_revokes_access_without_cache() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    let trial_end = now() + Duration::minutes(5);
    store.put_user(user, SubscriptionState::default().with_trial_ending(trial_end));
    let gate = gate(&store);

    let before = gate.check(user, Entitlement::PremiumIntegrations, now()).await.unwrap();
    let after = gate
        .check(user, Entitlement::PremiumIntegrations, trial_end + Duration::seconds(1))
        .await
        .unwrap();

    assert!(before.allowed);
    assert!(!after.allowed);
}

#[tokio::test]
async fn monthly_runs_reset_at_month_boundary() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("free", SubscriptionStatus::Active));
    for _ in 0..100 {
        store.record_execution(user, "2026-04-30T23:00:00Z".parse().unwrap());
    }
    let gate = gate(&store);

    let april = gate
        .check(user, Entitlement::MaxRunsPerMonth, "2026-04-30T23:30:00Z".parse().unwrap())
        .await
        .unwrap();
    assert!(!april.allowed);

    let may = gate.check(user, Entitlement::MaxRunsPerMonth, now()).await.unwrap();
    assert!(may.allowed);
    assert_eq!(may.ceiling, Some(100));
}

#[tokio::test]
async fn repeated_checks_agree_and_read_every_time() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("starter", SubscriptionStatus::Active));
    store.set_workflow_count(user, 1);
    let gate = gate(&store);

    let first = gate.check(user, Entitlement::MaxActiveWorkflows, now()).await.unwrap();
    let reads_after_first = store.read_count();
    let second = gate.check(user, Entitlement::MaxActiveWorkflows, now()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.read_count(), reads_after_first * 2);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let store = MockStore::new();
    let user = Uuid::new_v4();

    let err = gate(&store).check(user, Entitlement::MaxActiveWorkflows, now()).await.unwrap_err();
    assert!(matches!(err, EntitlementError::UserNotFound(id) if id == user));
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("agency", SubscriptionStatus::Active));
    store.fail_reads();

    let err = gate(&store).check(user, Entitlement::PrioritySupport, now()).await.unwrap_err();
    assert!(matches!(err, EntitlementError::Store(_)));
}

#[tokio::test]
async fn summary_lists_every_entitlement_with_usage() {
    let store = MockStore::new();
    let user = Uuid::new_v4();
    store.put_user(user, SubscriptionState::new("agency", SubscriptionStatus::Active));
    store.set_workflow_count(user, 42);

    let summary = gate(&store).summary(user, now()).await.unwrap();
    assert_eq!(summary.entitlements.len(), Entitlement::ALL.len());

    let workflows = summary
        .entitlements
        .iter()
        .find(|s| s.entitlement == Entitlement::MaxActiveWorkflows)
        .unwrap();
    assert_eq!(workflows.usage, Some(42));
    assert_eq!(workflows.value, EntitlementValue::Ceiling(None));
    assert!(workflows.check.allowed);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["effectivePlan"], "agency");
    assert_eq!(json["entitlements"][0]["entitlement"], "maxActiveWorkflows");
    assert_eq!(json["entitlements"][0]["allowed"], true);
}
