//! SQL DDL for initializing the metrics database.
//! SQLite-first design; can be adapted for other RDBMS.

/// Executed statement-by-statement at startup (sqlx::query does not accept
/// multi-statement strings).
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS stores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    shopify_url TEXT NULL,
    shopify_token TEXT NULL,
    facebook_ad_account_id TEXT NULL,
    facebook_token TEXT NULL,
    google_customer_id TEXT NULL,
    google_refresh_token TEXT NULL,
    google_access_token TEXT NULL,
    google_token_expiry TEXT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS daily_store_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL,
    date TEXT NOT NULL, -- YYYY-MM-DD
    facebook_meta_spend REAL NOT NULL DEFAULT 0,
    google_ad_spend REAL NOT NULL DEFAULT 0,
    shopify_sold_orders INTEGER NOT NULL DEFAULT 0,
    shopify_order_value REAL NOT NULL DEFAULT 0,
    shopify_sold_items INTEGER NOT NULL DEFAULT 0,
    UNIQUE(store_id, date)
);

CREATE INDEX IF NOT EXISTS idx_daily_metrics_store_date
    ON daily_store_metrics(store_id, date);

CREATE TABLE IF NOT EXISTS product_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    product_name TEXT NOT NULL DEFAULT '',
    product_image TEXT NULL,
    product_url TEXT NULL,
    total_quantity_sold INTEGER NOT NULL DEFAULT 0,
    total_revenue REAL NOT NULL DEFAULT 0,
    last_sync_date TEXT NULL, -- RFC3339
    UNIQUE(store_id, product_id)
);

CREATE TABLE IF NOT EXISTS traffic_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL,
    landing_page_path TEXT NOT NULL,
    landing_page_type TEXT NOT NULL DEFAULT '',
    window_start TEXT NOT NULL, -- YYYY-MM-DD
    window_end TEXT NOT NULL,   -- YYYY-MM-DD
    online_store_visitors INTEGER NOT NULL DEFAULT 0,
    sessions INTEGER NOT NULL DEFAULT 0,
    sessions_with_cart_additions INTEGER NOT NULL DEFAULT 0,
    sessions_reached_checkout INTEGER NOT NULL DEFAULT 0,
    UNIQUE(store_id, landing_page_path, window_start)
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    action TEXT NOT NULL,
    status TEXT NOT NULL, -- PENDING | SUCCESS | FAILURE
    store_id INTEGER NULL,
    metadata TEXT NULL, -- JSON
    error TEXT NULL,
    duration_ms INTEGER NULL,
    created_at TEXT NOT NULL -- RFC3339
);
"#;
