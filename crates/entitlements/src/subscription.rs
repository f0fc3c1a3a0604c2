//! Subscription state and effective-plan resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PlanId;

// ---------------------------------------------------------------------------
// SubscriptionStatus
// ---------------------------------------------------------------------------

/// Billing provider subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }

    /// Parse a status column. Unknown values read as "no subscription".
    pub fn from_stored(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            // Stripe spells it with one 'l'; accept the British spelling too.
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            "incomplete_expired" => Ok(Self::IncompleteExpired),
            "unpaid" => Ok(Self::Unpaid),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// SubscriptionState
// ---------------------------------------------------------------------------

/// The subscription fields persisted on a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Stored plan name, as written by the billing webhook.
    pub plan: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub renews_at: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionState {
    pub fn new(plan: impl Into<String>, status: SubscriptionStatus) -> Self {
        Self {
            plan: Some(plan.into()),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_trial_ending(mut self, at: DateTime<Utc>) -> Self {
        self.trial_ends_at = Some(at);
        self
    }

    /// `true` while `trial_ends_at` is strictly in the future.
    pub fn in_trial(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.is_some_and(|end| end > now)
    }
}

// ---------------------------------------------------------------------------
// EntitlementPolicy
// ---------------------------------------------------------------------------

/// Product policy knobs for effective-plan resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementPolicy {
    /// Plan granted while a trial is running. `None` disables the override
    /// and trials are billed as their stored plan.
    pub trial_plan: Option<PlanId>,
    /// Keep the stored plan while a payment is `past_due` (a grace period).
    /// When `false`, `past_due` users drop to free immediately.
    pub past_due_grants_access: bool,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            trial_plan: Some(PlanId::TOP_TIER),
            past_due_grants_access: false,
        }
    }
}

impl EntitlementPolicy {
    /// Compute the plan that actually applies to `state` at `now`.
    ///
    /// A running trial never lowers the plan: the result is the higher of the
    /// trial plan and what the subscription itself grants.
    pub fn resolve_effective_plan(&self, state: &SubscriptionState, now: DateTime<Utc>) -> PlanId {
        let paying = match state.status {
            Some(SubscriptionStatus::Active | SubscriptionStatus::Trialing) => true,
            Some(SubscriptionStatus::PastDue) => self.past_due_grants_access,
            _ => false,
        };

        let paid = if paying {
            PlanId::from_stored(state.plan.as_deref())
        } else {
            PlanId::Free
        };

        match self.trial_plan {
            Some(trial_plan) if state.in_trial(now) && trial_plan > paid => {
                debug!(plan = %trial_plan, "trial running, granting trial plan");
                trial_plan
            }
            _ => paid,
        }
    }
}

/// [`EntitlementPolicy::resolve_effective_plan`] with the default policy.
pub fn resolve_effective_plan(state: &SubscriptionState, now: DateTime<Utc>) -> PlanId {
    EntitlementPolicy::default().resolve_effective_plan(state, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-03-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn future_trial_grants_top_tier_regardless_of_status() {
        for status in [None, Some(SubscriptionStatus::Canceled), Some(SubscriptionStatus::PastDue)] {
            let state = SubscriptionState {
                plan: Some("free".into()),
                status,
                trial_ends_at: Some(now() + Duration::days(2)),
                ..Default::default()
            };
            assert_eq!(resolve_effective_plan(&state, now()), PlanId::Agency);
        }
    }

    #[test]
    fn trial_ending_exactly_now_has_lapsed() {
        let state = SubscriptionState::new("starter", SubscriptionStatus::Canceled)
            .with_trial_ending(now());
        assert_eq!(resolve_effective_plan(&state, now()), PlanId::Free);
    }

    #[test]
    fn expired_trial_falls_back_to_stored_plan() {
        let state = SubscriptionState::new("starter", SubscriptionStatus::Active)
            .with_trial_ending(now() - Duration::hours(1));
        assert_eq!(resolve_effective_plan(&state, now()), PlanId::Starter);
    }

    #[test]
    fn active_and_trialing_use_stored_plan() {
        for status in [SubscriptionStatus::Active, SubscriptionStatus::Trialing] {
            let state = SubscriptionState::new("pro", status);
            assert_eq!(resolve_effective_plan(&state, now()), PlanId::Pro);
        }
    }

    #[test]
    fn lapsed_statuses_resolve_to_free() {
        for status in [
            SubscriptionStatus::Canceled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
            SubscriptionStatus::Unpaid,
            SubscriptionStatus::Paused,
        ] {
            let state = SubscriptionState::new("agency", status);
            assert_eq!(resolve_effective_plan(&state, now()), PlanId::Free, "{status}");
        }
    }

    #[test]
    fn active_with_unknown_or_missing_plan_is_free() {
        let state = SubscriptionState::new("enterprise_legacy", SubscriptionStatus::Active);
        assert_eq!(resolve_effective_plan(&state, now()), PlanId::Free);

        let state = SubscriptionState {
            status: Some(SubscriptionStatus::Active),
            ..Default::default()
        };
        assert_eq!(resolve_effective_plan(&state, now()), PlanId::Free);
    }

    #[test]
    fn no_subscription_is_free() {
        assert_eq!(resolve_effective_plan(&SubscriptionState::default(), now()), PlanId::Free);
    }

    #[test]
    fn past_due_grace_is_opt_in() {
        let state = SubscriptionState::new("pro", SubscriptionStatus::PastDue);
        let grace = EntitlementPolicy {
            past_due_grants_access: true,
            ..Default::default()
        };
        assert_eq!(grace.resolve_effective_plan(&state, now()), PlanId::Pro);
    }

    #[test]
    fn trial_override_can_be_disabled_or_retargeted() {
        let state = SubscriptionState::new("starter", SubscriptionStatus::Trialing)
            .with_trial_ending(now() + Duration::days(7));

        let disabled = EntitlementPolicy {
            trial_plan: None,
            ..Default::default()
        };
        assert_eq!(disabled.resolve_effective_plan(&state, now()), PlanId::Starter);

        let pro_trial = EntitlementPolicy {
            trial_plan: Some(PlanId::Pro),
            ..Default::default()
        };
        assert_eq!(pro_trial.resolve_effective_plan(&state, now()), PlanId::Pro);
    }

    #[test]
    fn lower_trial_plan_never_downgrades_a_paid_plan() {
        let starter_trial = EntitlementPolicy {
            trial_plan: Some(PlanId::Starter),
            ..Default::default()
        };

        let state = SubscriptionState::new("pro", SubscriptionStatus::Active)
            .with_trial_ending(now() + Duration::days(3));
        assert_eq!(starter_trial.resolve_effective_plan(&state, now()), PlanId::Pro);

        let state = SubscriptionState::new("free", SubscriptionStatus::Canceled)
            .with_trial_ending(now() + Duration::days(3));
        assert_eq!(starter_trial.resolve_effective_plan(&state, now()), PlanId::Starter);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: EntitlementPolicy = serde_json::from_str(r#"{"past_due_grants_access": true}"#).unwrap();
        assert_eq!(policy.trial_plan, Some(PlanId::Agency));
        assert!(policy.past_due_grants_access);

        let policy: EntitlementPolicy = serde_json::from_str(r#"{"trial_plan": null}"#).unwrap();
        assert_eq!(policy.trial_plan, None);
    }

    #[test]
    fn status_parsing() {
        assert_eq!(SubscriptionStatus::from_stored(Some("past_due")), Some(SubscriptionStatus::PastDue));
        assert_eq!(SubscriptionStatus::from_stored(Some("cancelled")), Some(SubscriptionStatus::Canceled));
        assert_eq!(SubscriptionStatus::from_stored(Some("weird")), None);
        assert_eq!(SubscriptionStatus::from_stored(None), None);
    }
}
