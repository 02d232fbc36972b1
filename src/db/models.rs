use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One tenant's shop plus its vendor credential sets. A `None` credential
/// soft-disables that vendor's sync for the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub shopify_url: Option<String>,
    pub shopify_token: Option<String>,
    pub facebook_ad_account_id: Option<String>,
    pub facebook_token: Option<String>,
    pub google_customer_id: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_access_token: Option<String>,
    pub google_token_expiry: Option<DateTime<Utc>>,
}

impl Store {
    pub fn has_shopify(&self) -> bool {
        self.shopify_url.is_some() && self.shopify_token.is_some()
    }

    pub fn has_facebook(&self) -> bool {
        self.facebook_ad_account_id.is_some() && self.facebook_token.is_some()
    }

    pub fn has_google(&self) -> bool {
        self.google_customer_id.is_some() && self.google_refresh_token.is_some()
    }
}

/// One row per (store, calendar date). Re-sync fully replaces the five
/// metric fields rather than accumulating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyStoreMetric {
    pub store_id: i64,
    pub date: NaiveDate,
    pub facebook_meta_spend: f64,
    pub google_ad_spend: f64,
    pub shopify_sold_orders: i64,
    pub shopify_order_value: f64,
    pub shopify_sold_items: i64,
}

impl DailyStoreMetric {
    /// All metric fields zeroed; each vendor's merge pass fills in only the
    /// fields it owns.
    pub fn empty(store_id: i64, date: NaiveDate) -> Self {
        Self {
            store_id,
            date,
            facebook_meta_spend: 0.0,
            google_ad_spend: 0.0,
            shopify_sold_orders: 0,
            shopify_order_value: 0.0,
            shopify_sold_items: 0,
        }
    }
}

/// Per-product rollup, accumulated via increment-on-upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductMetric {
    pub store_id: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub product_url: Option<String>,
    pub total_quantity_sold: i64,
    pub total_revenue: f64,
    pub last_sync_date: Option<DateTime<Utc>>,
}

/// Landing-page funnel counts for one sync window, fully replaced on upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficMetric {
    pub store_id: i64,
    pub landing_page_path: String,
    pub landing_page_type: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub online_store_visitors: i64,
    pub sessions: i64,
    pub sessions_with_cart_additions: i64,
    pub sessions_reached_checkout: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Pending,
    Success,
    Failure,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// Append-only audit record; never mutated after insertion.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: String,
    pub status: AuditStatus,
    pub store_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            action: action.into(),
            status,
            store_id: None,
            metadata: None,
            error: None,
            duration_ms: None,
        }
    }

    pub fn store(mut self, store_id: i64) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, ms: i64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Per-store rollup produced by `MetricsStorage::aggregate`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreAggregate {
    pub store_id: i64,
    pub facebook_meta_spend: f64,
    pub google_ad_spend: f64,
    pub shopify_sold_orders: i64,
    pub shopify_order_value: f64,
    pub shopify_sold_items: i64,
}

/// Totals reduced across all matching stores.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AggregateTotals {
    pub facebook_meta_spend: f64,
    pub google_ad_spend: f64,
    pub shopify_sold_orders: i64,
    pub shopify_order_value: f64,
    pub shopify_sold_items: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub stores: Vec<StoreAggregate>,
    pub totals: AggregateTotals,
}
