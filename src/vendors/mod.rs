//! Vendor clients: one per external data source.
//!
//! The orchestrator only sees the traits below and gets concrete clients by
//! constructor injection, so tests can substitute in-memory fakes.

pub mod facebook;
pub mod google;
pub mod shopify;

pub use facebook::{EntityInsights, FacebookAdsClient, InsightLevel, InsightRow};
pub use google::GoogleAdsClient;
pub use shopify::ShopifyClient;

use crate::db::models::Store;
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

/// One day's ad spend, normalized across ad vendors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailySpend {
    pub date: NaiveDate,
    pub spend: f64,
}

/// One day's Shopify order totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyOrders {
    pub date: NaiveDate,
    pub sold_orders: i64,
    pub order_value: f64,
    pub sold_items: i64,
}

/// Per-product sales rollup from the Shopify orders feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub product_url: Option<String>,
    pub quantity_sold: i64,
    pub revenue: f64,
}

/// One landing page's funnel counts from Shopify analytics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandingPageTraffic {
    pub landing_page_type: String,
    pub landing_page_path: String,
    pub online_store_visitors: i64,
    pub sessions: i64,
    pub sessions_with_cart_additions: i64,
    pub sessions_reached_checkout: i64,
}

#[async_trait]
pub trait ShopifyApi: Send + Sync {
    async fn fetch_orders(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailyOrders>, SyncError>;

    async fn fetch_product_sales(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<ProductSales>, SyncError>;

    async fn fetch_traffic_analytics(
        &self,
        store: &Store,
        days_back: i64,
        limit: usize,
    ) -> Result<Vec<LandingPageTraffic>, SyncError>;
}

#[async_trait]
pub trait FacebookApi: Send + Sync {
    async fn fetch_ad_spend(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError>;

    async fn fetch_insights(
        &self,
        store: &Store,
        window: DateWindow,
        level: InsightLevel,
        breakdown: Option<&str>,
        entity_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InsightRow>, SyncError>;

    async fn fetch_campaigns_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError>;

    async fn fetch_adsets_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError>;

    async fn fetch_ads_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError>;
}

#[async_trait]
pub trait GoogleAdsApi: Send + Sync {
    async fn fetch_ad_spend(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError>;
}
