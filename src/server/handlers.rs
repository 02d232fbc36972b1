//! Admin HTTP handlers. Every `/admin/*` route requires the shared key via
//! the [`RequireKeyAuth`] extractor.

use crate::db::models::{AggregateReport, DailyStoreMetric, ProductMetric};
use crate::error::SyncError;
use crate::server::auth::RequireKeyAuth;
use crate::server::router::AppState;
use crate::sync::orchestrator::SyncReport;
use crate::sync::window::{DateWindow, resolve_named_range};
use crate::vendors::EntityInsights;
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    /// Named range: last7days, last30days or last90days.
    pub range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Comma-separated store id filter, summary endpoint only.
    pub store_ids: Option<String>,
    /// Row cap for pass-through vendor queries.
    pub limit: Option<usize>,
}

impl WindowQuery {
    /// Explicit dates win over a named range; default is last30days.
    fn resolve(&self) -> Result<DateWindow, SyncError> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => DateWindow::backfill(start, end),
            (None, None) => resolve_named_range(self.range.as_deref().unwrap_or("last30days")),
            _ => Err(SyncError::InvalidDateRange(
                "start_date and end_date must be given together".to_string(),
            )),
        }
    }

    fn store_id_filter(&self) -> Result<Option<Vec<i64>>, SyncError> {
        let Some(raw) = self.store_ids.as_deref() else {
            return Ok(None);
        };
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>().map_err(|_| {
                    SyncError::InvalidParameter(format!("`{s}` is not a valid store id"))
                })
            })
            .collect::<Result<Vec<i64>, SyncError>>()?;
        Ok(Some(ids))
    }
}

#[derive(Debug, Serialize)]
pub struct StoreMetricsResponse {
    pub store_id: i64,
    pub metrics: Vec<DailyStoreMetric>,
}

#[derive(Debug, Serialize)]
pub struct StoreProductsResponse {
    pub store_id: i64,
    pub products: Vec<ProductMetric>,
}

/// POST /admin/stores/{id}/sync
pub async fn trigger_sync(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
) -> Result<Json<SyncReport>, SyncError> {
    info!(store_id, "manual sync requested");
    let report = state.orchestrator.sync_store(store_id).await?;
    Ok(Json(report))
}

/// POST /admin/stores/{id}/backfill
pub async fn trigger_backfill(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Json(body): Json<BackfillRequest>,
) -> Result<Json<SyncReport>, SyncError> {
    info!(
        store_id,
        start = %body.start_date,
        end = %body.end_date,
        "backfill requested"
    );
    let report = state
        .orchestrator
        .backfill(store_id, &body.start_date, &body.end_date)
        .await?;
    Ok(Json(report))
}

/// GET /admin/stores/{id}/metrics
pub async fn store_metrics(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<StoreMetricsResponse>, SyncError> {
    let window = query.resolve()?;
    // 404 before an empty-but-successful lookup can mask a bad id.
    state.orchestrator.store_storage().find_one(store_id).await?;
    let metrics = state
        .orchestrator
        .metrics_storage()
        .find_by_store(store_id, window)
        .await?;
    Ok(Json(StoreMetricsResponse { store_id, metrics }))
}

/// GET /admin/metrics/summary
pub async fn metrics_summary(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<AggregateReport>, SyncError> {
    let window = query.resolve()?;
    let ids = query.store_id_filter()?;
    let report = state
        .orchestrator
        .metrics_storage()
        .aggregate(window, ids.as_deref())
        .await?;
    Ok(Json(report))
}

/// GET /admin/stores/{id}/products
pub async fn store_products(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
) -> Result<Json<StoreProductsResponse>, SyncError> {
    state.orchestrator.store_storage().find_one(store_id).await?;
    let products = state
        .orchestrator
        .product_storage()
        .list_for_store(store_id)
        .await?;
    Ok(Json(StoreProductsResponse { store_id, products }))
}

const DEFAULT_INSIGHT_LIMIT: usize = 100;

/// GET /admin/stores/{id}/facebook/{level}
///
/// Live pass-through to the ads API; nothing here is persisted.
pub async fn facebook_details(
    _auth: RequireKeyAuth,
    State(state): State<AppState>,
    Path((store_id, level)): Path<(i64, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<EntityInsights>>, SyncError> {
    let window = query.resolve()?;
    let store = state.orchestrator.store_storage().find_one(store_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT);
    let api = state.orchestrator.facebook_api();
    let rows = match level.as_str() {
        "campaigns" => api.fetch_campaigns_with_details(&store, window, limit).await?,
        "adsets" => api.fetch_adsets_with_details(&store, window, limit).await?,
        "ads" => api.fetch_ads_with_details(&store, window, limit).await?,
        other => {
            return Err(SyncError::InvalidParameter(format!(
                "unknown insight level `{other}` (expected campaigns, adsets or ads)"
            )));
        }
    };
    Ok(Json(rows))
}

/// GET /healthz, unauthenticated liveness probe.
pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dates_win_over_named_range() {
        let q = WindowQuery {
            range: Some("last7days".to_string()),
            start_date: Some("2024-11-01".to_string()),
            end_date: Some("2024-11-05".to_string()),
            ..Default::default()
        };
        let w = q.resolve().unwrap();
        assert_eq!(w.start.unwrap().to_string(), "2024-11-01");
        assert_eq!(w.end.to_string(), "2024-11-05");
    }

    #[test]
    fn lone_start_date_is_rejected() {
        let q = WindowQuery {
            start_date: Some("2024-11-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            q.resolve(),
            Err(SyncError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn store_id_filter_parses_csv() {
        let q = WindowQuery {
            store_ids: Some("1, 2,3".to_string()),
            ..Default::default()
        };
        assert_eq!(q.store_id_filter().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn store_id_filter_rejects_garbage() {
        let q = WindowQuery {
            store_ids: Some("1,x".to_string()),
            ..Default::default()
        };
        assert!(q.store_id_filter().is_err());
    }
}
