use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::AppState;
use crate::{auth::CurrentUser, error::ApiError};
use entitlements::{check_entitlement_by_name, Entitlement, EntitlementCheck, EntitlementSummary};

/// The caller's effective plan and every entitlement with current usage.
pub async fn summary(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EntitlementSummary>, ApiError> {
    Ok(Json(state.gate.summary(user_id, Utc::now()).await?))
}

/// Check one entitlement by name. Unknown names come back denied.
pub async fn check(
    CurrentUser(user_id): CurrentUser,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EntitlementCheck>, ApiError> {
    let now = Utc::now();
    let check = match name.parse::<Entitlement>() {
        Ok(entitlement) => state.gate.check(user_id, entitlement, now).await?,
        Err(_) => {
            let plan = state.gate.effective_plan(user_id, now).await?;
            check_entitlement_by_name(plan, &name, None)
        }
    };
    Ok(Json(check))
}
