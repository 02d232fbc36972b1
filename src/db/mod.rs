//! Database module: models, schema, and storage layers.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - one storage struct per table family, each wrapping the shared pool

pub mod metrics;
pub mod models;
pub mod products;
pub mod schema;
pub mod stores;
pub mod traffic;

pub use metrics::MetricsStorage;
pub use models::{
    AggregateReport, AggregateTotals, AuditEntry, AuditStatus, DailyStoreMetric, ProductMetric,
    Store, StoreAggregate, TrafficMetric,
};
pub use products::ProductMetricsStorage;
pub use schema::SQLITE_INIT;
pub use stores::{SqlitePool, StoreStorage};
pub use traffic::TrafficMetricsStorage;

use crate::error::SyncError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Open (creating if missing) the database and run the bundled DDL.
pub async fn connect(database_url: &str) -> Result<SqlitePool, SyncError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Execute the DDL statement-by-statement (sqlx::query rejects
/// multi-statement strings).
pub async fn init_schema(pool: &SqlitePool) -> Result<(), SyncError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
