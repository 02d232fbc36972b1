use crate::server::handlers;
use crate::sync::orchestrator::SyncOrchestrator;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/admin/stores/{id}/sync", post(handlers::trigger_sync))
        .route(
            "/admin/stores/{id}/backfill",
            post(handlers::trigger_backfill),
        )
        .route("/admin/stores/{id}/metrics", get(handlers::store_metrics))
        .route("/admin/metrics/summary", get(handlers::metrics_summary))
        .route("/admin/stores/{id}/products", get(handlers::store_products))
        .route(
            "/admin/stores/{id}/facebook/{level}",
            get(handlers::facebook_details),
        )
        .with_state(state)
}
