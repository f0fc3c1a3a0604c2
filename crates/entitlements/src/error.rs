//! Entitlement-level error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced while resolving entitlements.
///
/// A denial is *not* an error: it comes back as an
/// [`EntitlementCheck`](crate::EntitlementCheck) with `allowed == false`.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// A plan identifier that does not exist in the plan table.
    #[error("unknown plan: '{0}'")]
    UnknownPlan(String),

    /// An entitlement name that does not exist in the plan table.
    #[error("unknown entitlement: '{0}'")]
    UnknownEntitlement(String),

    /// No user row for the requested ID.
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    /// The backing store could not be read; the caller should fail the request.
    #[error("entitlement store error: {0}")]
    Store(#[from] anyhow::Error),
}
