//! Google Ads client: GAQL spend query with cached/refreshed OAuth access
//! tokens persisted back onto the store record.

use crate::audit::AuditSink;
use crate::config::CONFIG;
use crate::db::models::{AuditEntry, AuditStatus, Store};
use crate::db::stores::StoreStorage;
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use crate::vendors::{DailySpend, GoogleAdsApi};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use oauth2::{
    AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    RefreshToken, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

const ADS_BASE: &str = "https://googleads.googleapis.com";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh proactively when the cached token expires within this slack.
const TOKEN_EXPIRY_SLACK_MINS: i64 = 5;

const MICROS_PER_UNIT: f64 = 1_000_000.0;

type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

pub struct GoogleAdsClient {
    client: reqwest::Client,
    stores: StoreStorage,
    api_version: String,
    audit: AuditSink,
}

impl GoogleAdsClient {
    pub fn new(stores: StoreStorage, audit: AuditSink) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("adsync-google/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("FATAL: initialize Google Ads HTTP client failed");
        Self {
            client,
            stores,
            api_version: CONFIG.google_api_version.clone(),
            audit,
        }
    }

    /// Return a usable access token, refreshing and persisting it when the
    /// cached one is absent or expiring within the slack window. `None`
    /// means the store has no Google credentials at all (soft-disabled).
    async fn ensure_access_token(&self, store: &Store) -> Result<Option<String>, SyncError> {
        let Some(refresh_token) = store.google_refresh_token.as_deref() else {
            return Ok(None);
        };

        if let (Some(token), Some(expiry)) =
            (store.google_access_token.as_deref(), store.google_token_expiry)
            && expiry - Utc::now() > ChronoDuration::minutes(TOKEN_EXPIRY_SLACK_MINS)
        {
            return Ok(Some(token.to_string()));
        }

        let oauth_client = build_oauth2_client()?;
        let token_result: BasicTokenResponse = oauth_client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.client)
            .await?;

        let access_token = token_result.access_token().secret().clone();
        let expires_in = token_result
            .expires_in()
            .unwrap_or(Duration::from_secs(3600));
        let expiry = Utc::now()
            + ChronoDuration::from_std(expires_in).unwrap_or(ChronoDuration::seconds(3600));

        self.stores
            .update_google_token(store.id, &access_token, expiry)
            .await?;
        info!(store_id = store.id, "google access token refreshed");
        Ok(Some(access_token))
    }

    async fn search_stream(
        &self,
        customer_id: &str,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<Value>, SyncError> {
        let url = format!(
            "{ADS_BASE}/{ver}/customers/{customer_id}/googleAds:searchStream",
            ver = self.api_version,
        );
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "query": query }));
        if let Some(dev_token) = CONFIG.google_developer_token.as_deref() {
            request = request.header("developer-token", dev_token);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/0/error/message")
                .or_else(|| body.pointer("/error/message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown Google Ads error");
            return Err(SyncError::vendor(
                "google",
                format!("HTTP {status}: {message}"),
            ));
        }

        // searchStream returns an array of chunks, each with a results array.
        let mut results = Vec::new();
        if let Some(chunks) = body.as_array() {
            for chunk in chunks {
                if let Some(rows) = chunk.get("results").and_then(|r| r.as_array()) {
                    results.extend(rows.iter().cloned());
                }
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl GoogleAdsApi for GoogleAdsClient {
    async fn fetch_ad_spend(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError> {
        let Some(customer_id) = store.google_customer_id.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(access_token) = self.ensure_access_token(store).await? else {
            return Ok(Vec::new());
        };

        let started = Instant::now();
        self.audit
            .log(AuditEntry::new("google.fetch_ad_spend", AuditStatus::Pending).store(store.id));

        let since = window
            .start
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "2000-01-01".to_string());
        let until = window.end.format("%Y-%m-%d").to_string();
        let query = format!(
            "SELECT segments.date, metrics.cost_micros FROM customer \
             WHERE segments.date BETWEEN '{since}' AND '{until}'"
        );

        let result = self
            .search_stream(customer_id, &access_token, &query)
            .await
            .map(spend_by_date);

        let elapsed = started.elapsed().as_millis() as i64;
        match result {
            Ok(rows) => {
                self.audit.success("google.fetch_ad_spend", store.id, elapsed);
                Ok(rows)
            }
            Err(e) => {
                self.audit
                    .failure("google.fetch_ad_spend", store.id, &e.to_string(), elapsed);
                Err(e)
            }
        }
    }
}

fn build_oauth2_client() -> Result<GoogleOauth2Client, SyncError> {
    let client_id = CONFIG
        .google_client_id
        .clone()
        .ok_or_else(|| SyncError::Oauth2Token("ADSYNC_GOOGLE_CLIENT_ID not configured".into()))?;
    let client_secret = CONFIG.google_client_secret.clone().ok_or_else(|| {
        SyncError::Oauth2Token("ADSYNC_GOOGLE_CLIENT_SECRET not configured".into())
    })?;
    let client = OAuth2Client::new(ClientId::new(client_id))
        .set_client_secret(ClientSecret::new(client_secret))
        .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
        .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URI.to_string())?);
    Ok(client)
}

/// Sum cost per date; costs arrive in micro-currency units.
fn spend_by_date(rows: Vec<Value>) -> Vec<DailySpend> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        let Some(date) = row
            .pointer("/segments/date")
            .and_then(|d| d.as_str())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let micros = match row.pointer("/metrics/costMicros") {
            Some(Value::String(s)) => s.parse::<f64>().unwrap_or(0.0),
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        };
        *by_date.entry(date).or_insert(0.0) += micros / MICROS_PER_UNIT;
    }
    by_date
        .into_iter()
        .map(|(date, spend)| DailySpend { date, spend })
        .collect()
}
