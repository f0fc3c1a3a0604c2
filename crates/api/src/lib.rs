//! `api` crate — HTTP REST API layer.
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/activate
//!   POST   /api/v1/workflows/:id/deactivate
//!   POST   /api/v1/workflows/:id/execute
//!   GET    /api/v1/workflows/:id/executions
//!   POST   /api/v1/executions/:id/status
//!   GET    /api/v1/entitlements
//!   GET    /api/v1/entitlements/:name
//!   POST   /api/v1/billing/webhook
//!
//! Every route except the billing webhook identifies the caller through the
//! `x-user-id` header set by the authenticating gateway. The webhook is
//! unauthenticated here: deploy it only behind an edge proxy that verifies
//! the billing provider's signature, and never expose it directly.

pub mod auth;
pub mod billing_store;
pub mod error;
pub mod handlers;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use error::ApiError;
pub use handlers::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    use handlers::{billing, entitlements, executions, workflows};

    Router::new()
        .route("/api/v1/workflows", get(workflows::list).post(workflows::create))
        .route("/api/v1/workflows/:id", get(workflows::get).delete(workflows::delete))
        .route("/api/v1/workflows/:id/activate", post(workflows::activate))
        .route("/api/v1/workflows/:id/deactivate", post(workflows::deactivate))
        .route("/api/v1/workflows/:id/execute", post(executions::execute))
        .route("/api/v1/workflows/:id/executions", get(executions::list))
        .route("/api/v1/executions/:id/status", post(executions::report_status))
        .route("/api/v1/entitlements", get(entitlements::summary))
        .route("/api/v1/entitlements/:name", get(entitlements::check))
        .route("/api/v1/billing/webhook", post(billing::webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
