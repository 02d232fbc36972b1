#![allow(dead_code)]

use adsync::AuditSink;
use adsync::db::models::Store;
use adsync::db::{
    self, MetricsStorage, ProductMetricsStorage, SqlitePool, StoreStorage, TrafficMetricsStorage,
};
use adsync::error::SyncError;
use adsync::sync::SyncOrchestrator;
use adsync::sync::window::DateWindow;
use adsync::vendors::{
    DailyOrders, DailySpend, EntityInsights, FacebookApi, GoogleAdsApi, InsightLevel, InsightRow,
    LandingPageTraffic, ProductSales, ShopifyApi,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fresh file-backed SQLite database with the schema applied. The caller
/// removes the file at the end of the test.
pub async fn temp_db(tag: &str) -> (SqlitePool, PathBuf) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut path = std::env::temp_dir();
    path.push(format!("adsync-{tag}-{}-{nanos}.sqlite", std::process::id()));

    let url = format!("sqlite:{}", path.display());
    let pool = db::connect(&url).await.expect("failed to open test db");
    (pool, path)
}

pub fn store_with_all_vendors(name: &str) -> Store {
    Store {
        id: 0,
        name: name.to_string(),
        shopify_url: Some(format!("{name}.myshopify.com")),
        shopify_token: Some("shpat_test".to_string()),
        facebook_ad_account_id: Some("1234567890".to_string()),
        facebook_token: Some("fb_test".to_string()),
        google_customer_id: Some("111-222-3333".to_string()),
        google_refresh_token: Some("grt_test".to_string()),
        google_access_token: None,
        google_token_expiry: None,
    }
}

/// Per-vendor fetch counters shared with the fakes below.
#[derive(Default)]
pub struct VendorCalls {
    pub shopify: AtomicUsize,
    pub facebook: AtomicUsize,
    pub google: AtomicUsize,
}

pub struct FakeShopify {
    pub orders: Vec<DailyOrders>,
    pub sales: Vec<ProductSales>,
    pub traffic: Vec<LandingPageTraffic>,
    pub calls: Arc<VendorCalls>,
}

impl FakeShopify {
    pub fn empty(calls: Arc<VendorCalls>) -> Self {
        Self {
            orders: Vec::new(),
            sales: Vec::new(),
            traffic: Vec::new(),
            calls,
        }
    }
}

#[async_trait]
impl ShopifyApi for FakeShopify {
    async fn fetch_orders(
        &self,
        _store: &Store,
        _window: DateWindow,
    ) -> Result<Vec<DailyOrders>, SyncError> {
        self.calls
            .shopify
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.orders.clone())
    }

    async fn fetch_product_sales(
        &self,
        _store: &Store,
        _window: DateWindow,
    ) -> Result<Vec<ProductSales>, SyncError> {
        self.calls
            .shopify
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.sales.clone())
    }

    async fn fetch_traffic_analytics(
        &self,
        _store: &Store,
        _days_back: i64,
        _limit: usize,
    ) -> Result<Vec<LandingPageTraffic>, SyncError> {
        self.calls
            .shopify
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.traffic.clone())
    }
}

pub struct FakeFacebook {
    pub spend: Vec<DailySpend>,
    pub calls: Arc<VendorCalls>,
}

#[async_trait]
impl FacebookApi for FakeFacebook {
    async fn fetch_ad_spend(
        &self,
        _store: &Store,
        _window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError> {
        self.calls
            .facebook
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.spend.clone())
    }

    async fn fetch_insights(
        &self,
        _store: &Store,
        _window: DateWindow,
        _level: InsightLevel,
        _breakdown: Option<&str>,
        _entity_id: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<InsightRow>, SyncError> {
        Ok(Vec::new())
    }

    async fn fetch_campaigns_with_details(
        &self,
        _store: &Store,
        _window: DateWindow,
        _limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        Ok(Vec::new())
    }

    async fn fetch_adsets_with_details(
        &self,
        _store: &Store,
        _window: DateWindow,
        _limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        Ok(Vec::new())
    }

    async fn fetch_ads_with_details(
        &self,
        _store: &Store,
        _window: DateWindow,
        _limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        Ok(Vec::new())
    }
}

pub struct FakeGoogle {
    pub spend: Vec<DailySpend>,
    /// Fail fetches for this store id to exercise per-store isolation.
    pub fail_store: Option<i64>,
    pub calls: Arc<VendorCalls>,
}

#[async_trait]
impl GoogleAdsApi for FakeGoogle {
    async fn fetch_ad_spend(
        &self,
        store: &Store,
        _window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError> {
        self.calls
            .google
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_store == Some(store.id) {
            return Err(SyncError::vendor("google", "simulated outage"));
        }
        Ok(self.spend.clone())
    }
}

pub fn orchestrator_with(
    pool: &SqlitePool,
    shopify: Arc<dyn ShopifyApi>,
    facebook: Arc<dyn FacebookApi>,
    google: Arc<dyn GoogleAdsApi>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        StoreStorage::new(pool.clone()),
        MetricsStorage::new(pool.clone()),
        ProductMetricsStorage::new(pool.clone()),
        TrafficMetricsStorage::new(pool.clone()),
        shopify,
        facebook,
        google,
        AuditSink::spawn(pool.clone()),
    )
}
