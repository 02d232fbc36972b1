//! The sync orchestrator: iterates stores, fans out to the three vendor
//! clients concurrently, merges results by date and upserts metric rows.
//!
//! Stores are processed one at a time; a vendor failure aborts only that
//! store's iteration. The next scheduled run is the de facto retry.

use crate::audit::AuditSink;
use crate::db::models::{DailyStoreMetric, ProductMetric, Store, TrafficMetric};
use crate::db::{MetricsStorage, ProductMetricsStorage, StoreStorage, TrafficMetricsStorage};
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use crate::vendors::{DailyOrders, DailySpend, FacebookApi, GoogleAdsApi, ProductSales, ShopifyApi};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Landing-page caps for the two traffic schedules.
pub const DAILY_TRAFFIC_DAYS: i64 = 7;
pub const DAILY_TRAFFIC_LIMIT: usize = 20;
pub const WEEKLY_TRAFFIC_DAYS: i64 = 30;
pub const WEEKLY_TRAFFIC_LIMIT: usize = 50;

pub const PRODUCT_SYNC_TRAILING_DAYS: i64 = 30;

/// Outcome of one scheduled run over all stores.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
}

/// Outcome of an on-demand sync/backfill for a single store.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub store_id: i64,
    pub processed_dates: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub struct SyncOrchestrator {
    stores: StoreStorage,
    metrics: MetricsStorage,
    products: ProductMetricsStorage,
    traffic: TrafficMetricsStorage,
    shopify: Arc<dyn ShopifyApi>,
    facebook: Arc<dyn FacebookApi>,
    google: Arc<dyn GoogleAdsApi>,
    audit: AuditSink,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stores: StoreStorage,
        metrics: MetricsStorage,
        products: ProductMetricsStorage,
        traffic: TrafficMetricsStorage,
        shopify: Arc<dyn ShopifyApi>,
        facebook: Arc<dyn FacebookApi>,
        google: Arc<dyn GoogleAdsApi>,
        audit: AuditSink,
    ) -> Self {
        Self {
            stores,
            metrics,
            products,
            traffic,
            shopify,
            facebook,
            google,
            audit,
        }
    }

    pub fn store_storage(&self) -> &StoreStorage {
        &self.stores
    }

    pub fn metrics_storage(&self) -> &MetricsStorage {
        &self.metrics
    }

    pub fn product_storage(&self) -> &ProductMetricsStorage {
        &self.products
    }

    pub fn facebook_api(&self) -> &dyn FacebookApi {
        self.facebook.as_ref()
    }

    /// Daily spend/order sync over all stores; window = yesterday only.
    pub async fn run_daily(&self) -> Result<RunSummary, SyncError> {
        self.run_spend_sync(DateWindow::yesterday(), "sync.daily").await
    }

    async fn run_spend_sync(
        &self,
        window: DateWindow,
        action: &str,
    ) -> Result<RunSummary, SyncError> {
        let stores = self.stores.find_all().await?;
        let mut summary = RunSummary {
            processed: 0,
            failed: 0,
            start_date: window.start,
            end_date: window.end,
        };
        for store in &stores {
            let started = Instant::now();
            match self.sync_store_window(store, window).await {
                Ok(dates) => {
                    summary.processed += 1;
                    self.audit
                        .success(action, store.id, started.elapsed().as_millis() as i64);
                    info!(store_id = store.id, dates, "store sync complete");
                }
                Err(e) => {
                    summary.failed += 1;
                    self.audit.failure(
                        action,
                        store.id,
                        &e.to_string(),
                        started.elapsed().as_millis() as i64,
                    );
                    error!(store_id = store.id, error = %e, "store sync failed; continuing");
                }
            }
        }
        info!(
            processed = summary.processed,
            failed = summary.failed,
            "spend sync run finished"
        );
        Ok(summary)
    }

    /// Fetch the three vendors concurrently for one store, merge by date,
    /// upsert each resulting per-date record. Returns the number of dates
    /// written.
    pub async fn sync_store_window(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<usize, SyncError> {
        let (orders, fb_spend, google_spend) = tokio::try_join!(
            self.shopify.fetch_orders(store, window),
            self.facebook.fetch_ad_spend(store, window),
            self.google.fetch_ad_spend(store, window),
        )?;

        let merged = merge_by_date(store.id, &orders, &fb_spend, &google_spend);
        let count = merged.len();
        for record in merged.values() {
            self.metrics.create_or_update(record).await?;
        }
        Ok(count)
    }

    /// On-demand equivalent of the daily sync for one store.
    pub async fn sync_store(&self, store_id: i64) -> Result<SyncReport, SyncError> {
        let window = DateWindow::yesterday();
        self.sync_one(store_id, window, "sync.manual").await
    }

    /// Backfill an explicit date range for one store. The range is validated
    /// before any vendor call; validation failures produce no audit entry.
    pub async fn backfill(
        &self,
        store_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<SyncReport, SyncError> {
        let window = DateWindow::backfill(start_date, end_date)?;
        self.sync_one(store_id, window, "sync.backfill").await
    }

    async fn sync_one(
        &self,
        store_id: i64,
        window: DateWindow,
        action: &str,
    ) -> Result<SyncReport, SyncError> {
        let store = self.stores.find_one(store_id).await?;
        let started = Instant::now();
        match self.sync_store_window(&store, window).await {
            Ok(processed_dates) => {
                self.audit
                    .success(action, store.id, started.elapsed().as_millis() as i64);
                Ok(SyncReport {
                    store_id,
                    processed_dates,
                    // sync_one windows always carry a start bound.
                    start_date: window.start.unwrap_or(window.end),
                    end_date: window.end,
                })
            }
            Err(e) => {
                self.audit.failure(
                    action,
                    store.id,
                    &e.to_string(),
                    started.elapsed().as_millis() as i64,
                );
                Err(e)
            }
        }
    }

    /// Product rollup sync: zero existing rows, then re-apply increments
    /// from the freshly fetched batch. `window.start = None` is the monthly
    /// all-time variant.
    pub async fn run_products(&self, window: DateWindow) -> Result<RunSummary, SyncError> {
        let stores = self.stores.find_all().await?;
        let mut summary = RunSummary {
            processed: 0,
            failed: 0,
            start_date: window.start,
            end_date: window.end,
        };
        for store in &stores {
            let started = Instant::now();
            match self.sync_store_products(store, window).await {
                Ok(count) => {
                    summary.processed += 1;
                    self.audit
                        .success("sync.products", store.id, started.elapsed().as_millis() as i64);
                    info!(store_id = store.id, products = count, "product sync complete");
                }
                Err(e) => {
                    summary.failed += 1;
                    self.audit.failure(
                        "sync.products",
                        store.id,
                        &e.to_string(),
                        started.elapsed().as_millis() as i64,
                    );
                    error!(store_id = store.id, error = %e, "product sync failed; continuing");
                }
            }
        }
        Ok(summary)
    }

    pub async fn sync_store_products(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<usize, SyncError> {
        self.products.reset_for_store(store.id).await?;
        let sales = self.shopify.fetch_product_sales(store, window).await?;
        let batch: Vec<ProductMetric> = sales
            .into_iter()
            .map(|s| product_metric_from_sales(store.id, s))
            .collect();
        self.products.apply(&batch).await?;
        Ok(batch.len())
    }

    /// Traffic sync: delete rows from the new window start onward, then
    /// re-insert the freshly fetched landing pages.
    pub async fn run_traffic(
        &self,
        days_back: i64,
        limit: usize,
    ) -> Result<RunSummary, SyncError> {
        let stores = self.stores.find_all().await?;
        let today = Utc::now().date_naive();
        let window_start = today - Duration::days(days_back);
        let mut summary = RunSummary {
            processed: 0,
            failed: 0,
            start_date: Some(window_start),
            end_date: today,
        };
        for store in &stores {
            let started = Instant::now();
            match self
                .sync_store_traffic(store, days_back, limit, window_start, today)
                .await
            {
                Ok(count) => {
                    summary.processed += 1;
                    self.audit
                        .success("sync.traffic", store.id, started.elapsed().as_millis() as i64);
                    info!(store_id = store.id, pages = count, "traffic sync complete");
                }
                Err(e) => {
                    summary.failed += 1;
                    self.audit.failure(
                        "sync.traffic",
                        store.id,
                        &e.to_string(),
                        started.elapsed().as_millis() as i64,
                    );
                    error!(store_id = store.id, error = %e, "traffic sync failed; continuing");
                }
            }
        }
        Ok(summary)
    }

    pub async fn sync_store_traffic(
        &self,
        store: &Store,
        days_back: i64,
        limit: usize,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<usize, SyncError> {
        let pages = self
            .shopify
            .fetch_traffic_analytics(store, days_back, limit)
            .await?;
        self.traffic
            .delete_from_window_start(store.id, window_start)
            .await?;
        let rows: Vec<TrafficMetric> = pages
            .into_iter()
            .map(|p| TrafficMetric {
                store_id: store.id,
                landing_page_path: p.landing_page_path,
                landing_page_type: p.landing_page_type,
                window_start,
                window_end,
                online_store_visitors: p.online_store_visitors,
                sessions: p.sessions,
                sessions_with_cart_additions: p.sessions_with_cart_additions,
                sessions_reached_checkout: p.sessions_reached_checkout,
            })
            .collect();
        self.traffic.replace(&rows).await?;
        Ok(rows.len())
    }
}

/// Merge vendor results into one record per date. Every date any vendor
/// touched gets an entry; fields a vendor did not touch stay 0.
pub fn merge_by_date(
    store_id: i64,
    orders: &[DailyOrders],
    facebook_spend: &[DailySpend],
    google_spend: &[DailySpend],
) -> BTreeMap<NaiveDate, DailyStoreMetric> {
    let mut merged: BTreeMap<NaiveDate, DailyStoreMetric> = BTreeMap::new();

    for day in orders {
        let entry = merged
            .entry(day.date)
            .or_insert_with(|| DailyStoreMetric::empty(store_id, day.date));
        entry.shopify_sold_orders = day.sold_orders;
        entry.shopify_order_value = day.order_value;
        entry.shopify_sold_items = day.sold_items;
    }
    for day in facebook_spend {
        let entry = merged
            .entry(day.date)
            .or_insert_with(|| DailyStoreMetric::empty(store_id, day.date));
        entry.facebook_meta_spend = day.spend;
    }
    for day in google_spend {
        let entry = merged
            .entry(day.date)
            .or_insert_with(|| DailyStoreMetric::empty(store_id, day.date));
        entry.google_ad_spend = day.spend;
    }
    merged
}

fn product_metric_from_sales(store_id: i64, sales: ProductSales) -> ProductMetric {
    ProductMetric {
        store_id,
        product_id: sales.product_id,
        product_name: sales.product_name,
        product_image: sales.product_image,
        product_url: sales.product_url,
        total_quantity_sold: sales.quantity_sold,
        total_revenue: sales.revenue,
        last_sync_date: None,
    }
}
