//! Billing webhook: keeps the user's subscription columns in sync with the
//! billing provider.
//!
//! Deliveries are at-least-once, so every processed event ID is recorded and
//! replays are acknowledged without being applied again.
//!
//! The route carries no authentication of its own. It must only be reachable
//! through an edge proxy that verifies the provider's signature header and
//! drops unsigned or stale deliveries.

use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::billing_store::BillingStore;
use crate::error::ApiError;
use db::models::{SubscriptionUpdate, UserRow};
use entitlements::SubscriptionStatus;

#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: BillingEventData,
}

#[derive(Debug, Deserialize)]
pub struct BillingEventData {
    pub object: Value,
}

/// The subset of a subscription object this service cares about.
#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    customer: Option<String>,
    status: Option<String>,
    trial_end: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    customer: Option<String>,
}

/// Who an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub user_id: Option<Uuid>,
    pub customer_id: Option<String>,
}

/// What an event does to the user's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Overwrite all subscription columns.
    Replace(SubscriptionUpdate),
    /// Change only the status, keeping plan and dates.
    Status(SubscriptionStatus),
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Translate a provider event into a subscription change.
///
/// Returns `Ok(None)` for event types that do not touch subscriptions.
pub fn subscription_change(
    event: &BillingEvent,
) -> Result<Option<(UserRef, SubscriptionChange)>, ApiError> {
    let parse_err = |e: serde_json::Error| ApiError::BadRequest(format!("malformed {} payload: {e}", event.event_type));

    match event.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let sub: SubscriptionObject =
                serde_json::from_value(event.data.object.clone()).map_err(parse_err)?;
            let target = user_ref(&sub);
            let update = SubscriptionUpdate {
                plan: sub.metadata.get("plan").cloned(),
                status: sub.status,
                trial_ends_at: timestamp(sub.trial_end),
                renews_at: timestamp(sub.current_period_end),
                cancel_at_period_end: sub.cancel_at_period_end,
                stripe_customer_id: sub.customer,
            };
            Ok(Some((target, SubscriptionChange::Replace(update))))
        }
        "customer.subscription.deleted" => {
            let sub: SubscriptionObject =
                serde_json::from_value(event.data.object.clone()).map_err(parse_err)?;
            let target = user_ref(&sub);
            let update = SubscriptionUpdate {
                plan: None,
                status: Some(SubscriptionStatus::Canceled.as_str().to_owned()),
                stripe_customer_id: sub.customer,
                ..SubscriptionUpdate::default()
            };
            Ok(Some((target, SubscriptionChange::Replace(update))))
        }
        "invoice.payment_failed" => {
            let invoice: InvoiceObject =
                serde_json::from_value(event.data.object.clone()).map_err(parse_err)?;
            let target = UserRef { user_id: None, customer_id: invoice.customer };
            Ok(Some((target, SubscriptionChange::Status(SubscriptionStatus::PastDue))))
        }
        _ => Ok(None),
    }
}

fn user_ref(sub: &SubscriptionObject) -> UserRef {
    UserRef {
        user_id: sub.metadata.get("user_id").and_then(|id| Uuid::parse_str(id).ok()),
        customer_id: sub.customer.clone(),
    }
}

async fn find_user(store: &dyn BillingStore, target: &UserRef) -> Result<Option<UserRow>, ApiError> {
    if let Some(id) = target.user_id {
        if let Some(user) = store.get_user(id).await? {
            return Ok(Some(user));
        }
    }
    match &target.customer_id {
        Some(customer) => Ok(store.find_by_customer(customer).await?),
        None => Ok(None),
    }
}

/// Acknowledgement returned to the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub duplicate: bool,
}

/// Apply `event` at most once.
///
/// Events for users this service does not know are still recorded, so a
/// redelivery is acknowledged as a duplicate instead of being retried forever.
pub async fn apply_event(
    store: &dyn BillingStore,
    event: &BillingEvent,
) -> Result<WebhookReceipt, ApiError> {
    if store.is_event_processed(&event.id).await? {
        info!(event_id = %event.id, "duplicate billing event ignored");
        return Ok(WebhookReceipt { received: true, duplicate: true });
    }

    if let Some((target, change)) = subscription_change(event)? {
        match find_user(store, &target).await? {
            Some(user) => {
                let update = match change {
                    SubscriptionChange::Replace(update) => update,
                    SubscriptionChange::Status(status) => SubscriptionUpdate {
                        plan: user.subscription_plan.clone(),
                        status: Some(status.as_str().to_owned()),
                        trial_ends_at: user.trial_ends_at,
                        renews_at: user.subscription_renews_at,
                        cancel_at_period_end: user.cancel_at_period_end,
                        stripe_customer_id: None,
                    },
                };
                store.update_subscription(user.id, &update).await?;
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    user_id = %user.id,
                    status = ?update.status,
                    "subscription updated"
                );
            }
            None => warn!(event_id = %event.id, ?target, "billing event for unknown user"),
        }
    }

    store.mark_event_processed(&event.id, &event.event_type).await?;
    Ok(WebhookReceipt { received: true, duplicate: false })
}

pub async fn webhook(
    State(state): State<AppState>,
    Json(event): Json<BillingEvent>,
) -> Result<Json<WebhookReceipt>, ApiError> {
    let receipt = apply_event(state.billing.as_ref(), &event).await?;
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing_store::MemoryBillingStore;
    use serde_json::json;

    fn event(event_type: &str, object: Value) -> BillingEvent {
        BillingEvent {
            id: "evt_1".into(),
            event_type: event_type.into(),
            data: BillingEventData { object },
        }
    }

    #[test]
    fn subscription_update_replaces_columns() {
        let user_id = Uuid::new_v4();
        let ev = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "customer": "cus_9",
                "status": "trialing",
                "trial_end": 1_800_000_000,
                "current_period_end": 1_800_000_000,
                "cancel_at_period_end": true,
                "metadata": { "plan": "pro", "user_id": user_id.to_string() }
            }),
        );

        let (target, change) = subscription_change(&ev).unwrap().unwrap();
        assert_eq!(target.user_id, Some(user_id));
        assert_eq!(target.customer_id.as_deref(), Some("cus_9"));

        let SubscriptionChange::Replace(update) = change else {
            panic!("expected a full replacement");
        };
        assert_eq!(update.plan.as_deref(), Some("pro"));
        assert_eq!(update.status.as_deref(), Some("trialing"));
        assert_eq!(update.trial_ends_at, DateTime::from_timestamp(1_800_000_000, 0));
        assert!(update.cancel_at_period_end);
    }

    #[test]
    fn deletion_cancels_and_clears_plan() {
        let ev = event("customer.subscription.deleted", json!({ "customer": "cus_9", "status": "canceled" }));
        let (_, change) = subscription_change(&ev).unwrap().unwrap();
        let SubscriptionChange::Replace(update) = change else {
            panic!("expected a full replacement");
        };
        assert_eq!(update.plan, None);
        assert_eq!(update.status.as_deref(), Some("canceled"));
        assert_eq!(update.trial_ends_at, None);
    }

    #[test]
    fn failed_payment_marks_past_due_only() {
        let ev = event("invoice.payment_failed", json!({ "customer": "cus_9", "amount_due": 1900 }));
        let (target, change) = subscription_change(&ev).unwrap().unwrap();
        assert_eq!(target.customer_id.as_deref(), Some("cus_9"));
        assert_eq!(change, SubscriptionChange::Status(SubscriptionStatus::PastDue));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let ev = event("charge.refunded", json!({}));
        assert!(subscription_change(&ev).unwrap().is_none());
    }

    #[test]
    fn malformed_subscription_is_bad_request() {
        let ev = event("customer.subscription.updated", json!({ "status": 7 }));
        assert!(matches!(subscription_change(&ev), Err(ApiError::BadRequest(_))));
    }

    fn user(customer: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            subscription_plan: Some("pro".into()),
            subscription_status: Some("active".into()),
            trial_ends_at: DateTime::from_timestamp(1_700_000_000, 0),
            subscription_renews_at: DateTime::from_timestamp(1_800_000_000, 0),
            cancel_at_period_end: true,
            stripe_customer_id: Some(customer.into()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn redelivered_event_is_applied_once() {
        let store = MemoryBillingStore::new();
        let owner = user("cus_9");
        store.put_user(owner.clone());
        let ev = event(
            "customer.subscription.updated",
            json!({
                "customer": "cus_9",
                "status": "active",
                "metadata": { "plan": "agency", "user_id": owner.id.to_string() }
            }),
        );

        let first = apply_event(&store, &ev).await.unwrap();
        assert_eq!(first, WebhookReceipt { received: true, duplicate: false });

        let second = apply_event(&store, &ev).await.unwrap();
        assert_eq!(second, WebhookReceipt { received: true, duplicate: true });

        assert_eq!(store.update_count(), 1);
        assert_eq!(store.user(owner.id).unwrap().subscription_plan.as_deref(), Some("agency"));
    }

    #[tokio::test]
    async fn failed_payment_keeps_stored_plan_and_dates() {
        let store = MemoryBillingStore::new();
        let owner = user("cus_9");
        store.put_user(owner.clone());

        let ev = event("invoice.payment_failed", json!({ "customer": "cus_9" }));
        apply_event(&store, &ev).await.unwrap();

        let stored = store.user(owner.id).unwrap();
        assert_eq!(stored.subscription_status.as_deref(), Some("past_due"));
        assert_eq!(stored.subscription_plan, owner.subscription_plan);
        assert_eq!(stored.trial_ends_at, owner.trial_ends_at);
        assert_eq!(stored.subscription_renews_at, owner.subscription_renews_at);
        assert!(stored.cancel_at_period_end);
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_9"));
    }

    #[tokio::test]
    async fn unknown_user_is_still_recorded() {
        let store = MemoryBillingStore::new();
        let ev = event("invoice.payment_failed", json!({ "customer": "cus_unknown" }));

        let receipt = apply_event(&store, &ev).await.unwrap();
        assert!(!receipt.duplicate);
        assert_eq!(store.update_count(), 0);
        assert_eq!(store.processed_type("evt_1").as_deref(), Some("invoice.payment_failed"));

        let again = apply_event(&store, &ev).await.unwrap();
        assert!(again.duplicate);
    }

    #[tokio::test]
    async fn malformed_event_is_not_recorded() {
        let store = MemoryBillingStore::new();
        let ev = event("customer.subscription.updated", json!({ "status": 7 }));

        assert!(matches!(apply_event(&store, &ev).await, Err(ApiError::BadRequest(_))));
        assert_eq!(store.processed_type("evt_1"), None);
    }
}
