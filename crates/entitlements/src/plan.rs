//! The plan table: a static mapping from plan to entitlement value.
//!
//! | plan    | workflows | runs / month | execute | custom int. | premium int. | priority support |
//! |---------|-----------|--------------|---------|-------------|--------------|------------------|
//! | free    | 1         | 100          | no      | no          | no           | no               |
//! | starter | 3         | 1 000        | yes     | no          | no           | no               |
//! | pro     | 10        | 10 000       | yes     | yes         | no           | no               |
//! | agency  | unlimited | unlimited    | yes     | yes         | yes          | yes              |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::EntitlementError;

// ---------------------------------------------------------------------------
// PlanId
// ---------------------------------------------------------------------------

/// A subscription tier. Variants are declared lowest tier first so the
/// derived ordering matches the tier ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    Free,
    Starter,
    Pro,
    Agency,
}

impl PlanId {
    /// Every plan, lowest tier first.
    pub const ALL: [PlanId; 4] = [PlanId::Free, PlanId::Starter, PlanId::Pro, PlanId::Agency];

    /// The highest tier on offer.
    pub const TOP_TIER: PlanId = PlanId::Agency;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Agency => "agency",
        }
    }

    /// Human-facing name used in upgrade hints.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Starter => "Starter",
            Self::Pro => "Pro",
            Self::Agency => "Agency",
        }
    }

    /// Interpret a plan name read from storage.
    ///
    /// Null and unrecognised names resolve to [`PlanId::Free`] so a typo or a
    /// retired plan never grants paid access.
    pub fn from_stored(raw: Option<&str>) -> PlanId {
        match raw {
            None => PlanId::Free,
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!(plan = name, "unrecognised stored plan, falling back to free");
                PlanId::Free
            }),
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "agency" => Ok(Self::Agency),
            _ => Err(EntitlementError::UnknownPlan(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Entitlement
// ---------------------------------------------------------------------------

/// Whether an entitlement is an on/off switch or a numeric ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementKind {
    Boolean,
    Countable,
}

/// A single gated capability or limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Entitlement {
    /// Number of workflows a user may own.
    MaxActiveWorkflows,
    /// Number of executions a user may start per calendar month (UTC).
    MaxRunsPerMonth,
    AllowWorkflowExecution,
    CustomIntegrations,
    PremiumIntegrations,
    PrioritySupport,
}

impl Entitlement {
    pub const ALL: [Entitlement; 6] = [
        Entitlement::MaxActiveWorkflows,
        Entitlement::MaxRunsPerMonth,
        Entitlement::AllowWorkflowExecution,
        Entitlement::CustomIntegrations,
        Entitlement::PremiumIntegrations,
        Entitlement::PrioritySupport,
    ];

    pub fn kind(self) -> EntitlementKind {
        match self {
            Self::MaxActiveWorkflows | Self::MaxRunsPerMonth => EntitlementKind::Countable,
            Self::AllowWorkflowExecution
            | Self::CustomIntegrations
            | Self::PremiumIntegrations
            | Self::PrioritySupport => EntitlementKind::Boolean,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxActiveWorkflows => "maxActiveWorkflows",
            Self::MaxRunsPerMonth => "maxRunsPerMonth",
            Self::AllowWorkflowExecution => "allowWorkflowExecution",
            Self::CustomIntegrations => "customIntegrations",
            Self::PremiumIntegrations => "premiumIntegrations",
            Self::PrioritySupport => "prioritySupport",
        }
    }
}

impl fmt::Display for Entitlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entitlement {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Entitlement::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| EntitlementError::UnknownEntitlement(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// The value a plan assigns to an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntitlementValue {
    /// Boolean capability.
    Flag(bool),
    /// Numeric ceiling; `None` means unlimited.
    Ceiling(Option<u64>),
}

/// Look up the value `plan` assigns to `entitlement`. Pure and total.
pub fn entitlement_value(plan: PlanId, entitlement: Entitlement) -> EntitlementValue {
    use Entitlement::*;
    use EntitlementValue::{Ceiling, Flag};
    use PlanId::*;

    match (plan, entitlement) {
        (Free, MaxActiveWorkflows) => Ceiling(Some(1)),
        (Starter, MaxActiveWorkflows) => Ceiling(Some(3)),
        (Pro, MaxActiveWorkflows) => Ceiling(Some(10)),
        (Agency, MaxActiveWorkflows) => Ceiling(None),

        (Free, MaxRunsPerMonth) => Ceiling(Some(100)),
        (Starter, MaxRunsPerMonth) => Ceiling(Some(1_000)),
        (Pro, MaxRunsPerMonth) => Ceiling(Some(10_000)),
        (Agency, MaxRunsPerMonth) => Ceiling(None),

        (Free, AllowWorkflowExecution) => Flag(false),
        (Starter | Pro | Agency, AllowWorkflowExecution) => Flag(true),

        (Free | Starter, CustomIntegrations) => Flag(false),
        (Pro | Agency, CustomIntegrations) => Flag(true),

        (Free | Starter | Pro, PremiumIntegrations) => Flag(false),
        (Agency, PremiumIntegrations) => Flag(true),

        (Free | Starter | Pro, PrioritySupport) => Flag(false),
        (Agency, PrioritySupport) => Flag(true),
    }
}

/// Same lookup keyed by a raw plan name; unknown names read `free`'s row.
pub fn entitlement_value_for_name(plan: &str, entitlement: Entitlement) -> EntitlementValue {
    entitlement_value(PlanId::from_stored(Some(plan)), entitlement)
}

/// The lowest plan that switches a boolean entitlement on.
///
/// Returns `None` for countable entitlements and for flags no plan grants.
pub fn minimum_plan_for(entitlement: Entitlement) -> Option<PlanId> {
    PlanId::ALL
        .into_iter()
        .find(|&plan| entitlement_value(plan, entitlement) == EntitlementValue::Flag(true))
}
