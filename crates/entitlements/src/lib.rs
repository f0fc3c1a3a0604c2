//! `entitlements` crate — plan table, effective-plan resolution, and feature gating.
//!
//! Everything here is pure except [`Gatekeeper`], which reads through the
//! injected [`EntitlementStore`].

pub mod error;
pub mod plan;
pub mod subscription;
pub mod resolver;
pub mod usage;
pub mod store;
pub mod gate;
pub mod mock;

pub use error::EntitlementError;
pub use plan::{entitlement_value, Entitlement, EntitlementKind, EntitlementValue, PlanId};
pub use subscription::{resolve_effective_plan, EntitlementPolicy, SubscriptionState, SubscriptionStatus};
pub use resolver::{check_entitlement, check_entitlement_by_name, EntitlementCheck};
pub use store::EntitlementStore;
pub use gate::{EntitlementSummary, Gatekeeper};

#[cfg(test)]
mod gate_tests;
