pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod server;
pub mod sync;
pub mod vendors;

pub use audit::AuditSink;
pub use error::SyncError;
pub use sync::{DateWindow, SyncOrchestrator};

use crate::db::{
    MetricsStorage, ProductMetricsStorage, SqlitePool, StoreStorage, TrafficMetricsStorage,
};
use crate::vendors::{FacebookAdsClient, GoogleAdsClient, ShopifyClient};
use std::sync::Arc;

/// Wire the real vendor clients and storages over one pool.
pub fn build_orchestrator(pool: SqlitePool, audit: AuditSink) -> Arc<SyncOrchestrator> {
    let stores = StoreStorage::new(pool.clone());
    let orchestrator = SyncOrchestrator::new(
        stores.clone(),
        MetricsStorage::new(pool.clone()),
        ProductMetricsStorage::new(pool.clone()),
        TrafficMetricsStorage::new(pool),
        Arc::new(ShopifyClient::new(audit.clone())),
        Arc::new(FacebookAdsClient::new(audit.clone())),
        Arc::new(GoogleAdsClient::new(stores, audit.clone())),
        audit,
    );
    Arc::new(orchestrator)
}
