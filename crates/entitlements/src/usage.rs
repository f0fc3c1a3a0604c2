//! Usage counting for countable entitlements.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{Entitlement, EntitlementError, EntitlementKind, EntitlementStore};

/// First instant of the calendar month containing `now` (UTC).
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| now.naive_utc());
    Utc.from_utc_datetime(&first)
}

pub async fn count_active_workflows(
    store: &dyn EntitlementStore,
    user_id: Uuid,
) -> Result<u64, EntitlementError> {
    store.count_workflows(user_id).await
}

pub async fn count_executions_this_month(
    store: &dyn EntitlementStore,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, EntitlementError> {
    store.count_executions_since(user_id, month_start(now)).await
}

/// Current usage for `entitlement`, or `None` for boolean entitlements.
pub async fn usage_for(
    store: &dyn EntitlementStore,
    user_id: Uuid,
    entitlement: Entitlement,
    now: DateTime<Utc>,
) -> Result<Option<u64>, EntitlementError> {
    if entitlement.kind() == EntitlementKind::Boolean {
        return Ok(None);
    }

    let usage = match entitlement {
        Entitlement::MaxRunsPerMonth => count_executions_this_month(store, user_id, now).await?,
        _ => count_active_workflows(store, user_id).await?,
    };
    Ok(Some(usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn month_start_truncates_to_first_midnight() {
        assert_eq!(month_start(at("2026-03-15T12:34:56Z")), at("2026-03-01T00:00:00Z"));
        assert_eq!(month_start(at("2026-03-01T00:00:00Z")), at("2026-03-01T00:00:00Z"));
        assert_eq!(month_start(at("2024-02-29T23:59:59Z")), at("2024-02-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn executions_before_the_month_are_not_counted() {
        let store = MockStore::new();
        let user = Uuid::new_v4();
        let now = at("2026-03-15T12:00:00Z");

        store.record_execution(user, at("2026-02-28T23:59:59Z"));
        store.record_execution(user, at("2026-03-01T00:00:00Z"));
        store.record_execution(user, now - Duration::hours(1));
        store.record_execution(Uuid::new_v4(), now);

        assert_eq!(count_executions_this_month(&store, user, now).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn usage_is_only_counted_for_countable_entitlements() {
        let store = MockStore::new();
        let user = Uuid::new_v4();
        store.set_workflow_count(user, 4);
        let now = Utc::now();

        assert_eq!(usage_for(&store, user, Entitlement::MaxActiveWorkflows, now).await.unwrap(), Some(4));
        assert_eq!(usage_for(&store, user, Entitlement::MaxRunsPerMonth, now).await.unwrap(), Some(0));
        assert_eq!(usage_for(&store, user, Entitlement::CustomIntegrations, now).await.unwrap(), None);
        assert_eq!(store.read_count(), 2);
    }
}
