//! Entitlement resolver — "can this plan do X, given current usage?"
//!
//! Pure functions only. The [`Gatekeeper`](crate::Gatekeeper) feeds these with
//! a freshly resolved plan and freshly counted usage on every request.

use serde::{Deserialize, Serialize};

use crate::plan::{entitlement_value, minimum_plan_for, Entitlement, EntitlementValue, PlanId};

/// Outcome of a single entitlement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementCheck {
    pub allowed: bool,
    /// Numeric ceiling for countable entitlements; `None` when unlimited or boolean.
    pub ceiling: Option<u64>,
    /// Why the check was denied. Always present when `allowed == false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EntitlementCheck {
    fn allow(ceiling: Option<u64>) -> Self {
        Self { allowed: true, ceiling, reason: None }
    }

    fn deny(ceiling: Option<u64>, reason: String) -> Self {
        Self { allowed: false, ceiling, reason: Some(reason) }
    }
}

/// Check `entitlement` for `plan`.
///
/// `current_usage` is only consulted for countable entitlements; when it is
/// `None` the usage is taken as zero.
pub fn check_entitlement(
    plan: PlanId,
    entitlement: Entitlement,
    current_usage: Option<u64>,
) -> EntitlementCheck {
    match entitlement_value(plan, entitlement) {
        EntitlementValue::Flag(true) => EntitlementCheck::allow(None),
        EntitlementValue::Flag(false) => EntitlementCheck::deny(None, upgrade_reason(entitlement)),
        EntitlementValue::Ceiling(None) => EntitlementCheck::allow(None),
        EntitlementValue::Ceiling(Some(ceiling)) => {
            let usage = current_usage.unwrap_or(0);
            if usage < ceiling {
                EntitlementCheck::allow(Some(ceiling))
            } else {
                EntitlementCheck::deny(Some(ceiling), limit_reason(entitlement, usage, ceiling))
            }
        }
    }
}

/// Like [`check_entitlement`] but keyed by a raw entitlement name, as it
/// arrives from a URL. Unknown names are denied, never allowed.
pub fn check_entitlement_by_name(
    plan: PlanId,
    name: &str,
    current_usage: Option<u64>,
) -> EntitlementCheck {
    match name.parse::<Entitlement>() {
        Ok(entitlement) => check_entitlement(plan, entitlement, current_usage),
        Err(err) => {
            tracing::warn!(name, "entitlement check for unknown name denied");
            EntitlementCheck::deny(None, err.to_string())
        }
    }
}

fn limit_reason(entitlement: Entitlement, usage: u64, ceiling: u64) -> String {
    match entitlement {
        Entitlement::MaxActiveWorkflows => format!(
            "Workflow limit reached. You have {usage} workflow(s). Maximum allowed: {ceiling}."
        ),
        Entitlement::MaxRunsPerMonth => format!(
            "Monthly execution limit reached. You have used {usage} execution(s) this month. \
             Maximum allowed: {ceiling}."
        ),
        other => format!("Limit reached for {other}. Current usage: {usage}. Maximum allowed: {ceiling}."),
    }
}

fn upgrade_reason(entitlement: Entitlement) -> String {
    let action = match entitlement {
        Entitlement::AllowWorkflowExecution => "execute workflows",
        Entitlement::CustomIntegrations => "use custom integrations",
        Entitlement::PremiumIntegrations => "use premium integrations",
        Entitlement::PrioritySupport => "get priority support",
        Entitlement::MaxActiveWorkflows | Entitlement::MaxRunsPerMonth => "raise this limit",
    };

    match minimum_plan_for(entitlement) {
        Some(plan) => format!("Please upgrade to {} to {action}.", plan.display_name()),
        None => format!("Your plan does not allow you to {action}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_checks_mirror_the_table() {
        for plan in PlanId::ALL {
            for e in Entitlement::ALL {
                if let EntitlementValue::Flag(expected) = entitlement_value(plan, e) {
                    let check = check_entitlement(plan, e, None);
                    assert_eq!(check.allowed, expected, "{plan}/{e}");
                    assert_eq!(check.reason.is_some(), !expected);
                    assert_eq!(check.ceiling, None);
                }
            }
        }
    }

    #[test]
    fn countable_checks_compare_strictly_below_ceiling() {
        for plan in PlanId::ALL {
            for e in [Entitlement::MaxActiveWorkflows, Entitlement::MaxRunsPerMonth] {
                let ceiling = match entitlement_value(plan, e) {
                    EntitlementValue::Ceiling(c) => c,
                    EntitlementValue::Flag(_) => unreachable!(),
                };
                for usage in [0, 1, 2, 3, 9, 10, 11, 100, 1_000, 10_000, 1_000_000] {
                    let check = check_entitlement(plan, e, Some(usage));
                    let expected = ceiling.map_or(true, |c| usage < c);
                    assert_eq!(check.allowed, expected, "{plan}/{e} usage={usage}");
                    assert_eq!(check.ceiling, ceiling);
                }
            }
        }
    }

    #[test]
    fn starter_at_workflow_limit_is_denied_with_counts() {
        let check = check_entitlement(PlanId::Starter, Entitlement::MaxActiveWorkflows, Some(3));
        assert!(!check.allowed);
        assert_eq!(check.ceiling, Some(3));
        assert_eq!(
            check.reason.as_deref(),
            Some("Workflow limit reached. You have 3 workflow(s). Maximum allowed: 3.")
        );
    }

    #[test]
    fn run_limit_reason_mentions_usage_and_ceiling() {
        let check = check_entitlement(PlanId::Free, Entitlement::MaxRunsPerMonth, Some(120));
        let reason = check.reason.unwrap();
        assert!(reason.contains("120"));
        assert!(reason.contains("100"));
    }

    #[test]
    fn missing_usage_counts_as_zero() {
        assert!(check_entitlement(PlanId::Free, Entitlement::MaxActiveWorkflows, None).allowed);
    }

    #[test]
    fn free_plan_gets_upgrade_hint_for_execution() {
        let check = check_entitlement(PlanId::Free, Entitlement::AllowWorkflowExecution, None);
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some("Please upgrade to Starter to execute workflows."));
    }

    #[test]
    fn checks_are_idempotent() {
        for plan in PlanId::ALL {
            for e in Entitlement::ALL {
                assert_eq!(check_entitlement(plan, e, Some(5)), check_entitlement(plan, e, Some(5)));
            }
        }
    }

    #[test]
    fn unknown_entitlement_name_fails_closed() {
        let check = check_entitlement_by_name(PlanId::Agency, "maxWorkflowz", None);
        assert!(!check.allowed);
        assert!(check.reason.unwrap().contains("maxWorkflowz"));

        assert!(check_entitlement_by_name(PlanId::Agency, "premiumIntegrations", None).allowed);
    }

    #[test]
    fn serializes_camel_case_without_empty_reason() {
        let json = serde_json::to_value(check_entitlement(PlanId::Pro, Entitlement::MaxActiveWorkflows, Some(2)))
            .unwrap();
        assert_eq!(json, serde_json::json!({ "allowed": true, "ceiling": 10 }));
    }
}
