//! Runtime configuration, resolved once from the environment.

use figment::{Figment, providers::Env};
use serde::Deserialize;
use std::sync::LazyLock;

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Figment::new()
        .merge(Env::prefixed("ADSYNC_"))
        .extract()
        .expect("FATAL: invalid ADSYNC_* environment configuration")
});

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_url() -> String {
    "sqlite:adsync.sqlite".to_string()
}

fn default_shopify_api_version() -> String {
    "2024-10".to_string()
}

fn default_facebook_api_version() -> String {
    "v19.0".to_string()
}

fn default_google_api_version() -> String {
    "v17".to_string()
}

fn default_shopify_day_delay_ms() -> u64 {
    500
}

// Cron defaults: daily jobs shortly after midnight UTC, staggered so the
// vendor APIs are not hit by everything at once.
fn default_daily_sync_cron() -> String {
    "0 10 0 * * *".to_string()
}

fn default_product_sync_cron() -> String {
    "0 30 1 * * *".to_string()
}

fn default_monthly_product_sync_cron() -> String {
    "0 0 3 1 * *".to_string()
}

fn default_daily_traffic_cron() -> String {
    "0 45 2 * * *".to_string()
}

fn default_weekly_traffic_cron() -> String {
    "0 0 4 * * Sun".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Shared secret for the admin HTTP surface.
    pub admin_key: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// App-level Google OAuth client (per-store refresh tokens are stored on
    /// the store record).
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
    #[serde(default)]
    pub google_developer_token: Option<String>,

    #[serde(default = "default_shopify_api_version")]
    pub shopify_api_version: String,
    #[serde(default = "default_facebook_api_version")]
    pub facebook_api_version: String,
    #[serde(default = "default_google_api_version")]
    pub google_api_version: String,

    /// Fixed delay between per-day Shopify order fetches.
    #[serde(default = "default_shopify_day_delay_ms")]
    pub shopify_day_delay_ms: u64,

    #[serde(default)]
    pub scheduler_enabled: bool,
    #[serde(default = "default_daily_sync_cron")]
    pub daily_sync_cron: String,
    #[serde(default = "default_product_sync_cron")]
    pub product_sync_cron: String,
    #[serde(default = "default_monthly_product_sync_cron")]
    pub monthly_product_sync_cron: String,
    #[serde(default = "default_daily_traffic_cron")]
    pub daily_traffic_cron: String,
    #[serde(default = "default_weekly_traffic_cron")]
    pub weekly_traffic_cron: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            admin_key: String::new(),
            bind_addr: default_bind_addr(),
            loglevel: default_loglevel(),
            google_client_id: None,
            google_client_secret: None,
            google_developer_token: None,
            shopify_api_version: default_shopify_api_version(),
            facebook_api_version: default_facebook_api_version(),
            google_api_version: default_google_api_version(),
            shopify_day_delay_ms: default_shopify_day_delay_ms(),
            scheduler_enabled: false,
            daily_sync_cron: default_daily_sync_cron(),
            product_sync_cron: default_product_sync_cron(),
            monthly_product_sync_cron: default_monthly_product_sync_cron(),
            daily_traffic_cron: default_daily_traffic_cron(),
            weekly_traffic_cron: default_weekly_traffic_cron(),
        }
    }
}
