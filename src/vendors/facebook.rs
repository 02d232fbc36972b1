//! Facebook (Meta) Marketing API client: daily spend, insight rows with
//! derived metrics, and entity listings joined with their insights.

use crate::audit::AuditSink;
use crate::config::CONFIG;
use crate::db::models::{AuditEntry, AuditStatus, Store};
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use crate::vendors::{DailySpend, FacebookApi};
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

const GRAPH_BASE: &str = "https://graph.facebook.com";

/// "User request limit reached" -- the one error code retried in-process.
const RATE_LIMIT_CODE: i64 = 17;
const RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);
const RATE_LIMIT_MAX_RETRIES: usize = 3;

const INSIGHT_FIELDS: &str =
    "spend,reach,impressions,frequency,clicks,inline_link_clicks,actions,objective,purchase_roas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightLevel {
    Campaign,
    Adset,
    Ad,
}

impl InsightLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::Adset => "adset",
            Self::Ad => "ad",
        }
    }

    fn id_field(self) -> &'static str {
        match self {
            Self::Campaign => "campaign_id",
            Self::Adset => "adset_id",
            Self::Ad => "ad_id",
        }
    }

    fn name_field(self) -> &'static str {
        match self {
            Self::Campaign => "campaign_name",
            Self::Adset => "adset_name",
            Self::Ad => "ad_name",
        }
    }

    fn edge(self) -> &'static str {
        match self {
            Self::Campaign => "campaigns",
            Self::Adset => "adsets",
            Self::Ad => "ads",
        }
    }
}

/// One insight row with its derived ratios precomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightRow {
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub date_start: Option<NaiveDate>,
    pub date_stop: Option<NaiveDate>,
    pub breakdown: Option<String>,
    pub spend: f64,
    pub reach: i64,
    pub impressions: i64,
    pub frequency: f64,
    pub clicks: i64,
    pub link_clicks: i64,
    pub results: i64,
    pub cpm: f64,
    pub cpc: f64,
    pub ctr: f64,
    pub link_ctr: f64,
    pub cost_per_result: f64,
    pub roas: f64,
}

/// Entity metadata joined with its insight row (if the entity delivered in
/// the window).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInsights {
    pub entity_id: String,
    pub name: String,
    pub status: Option<String>,
    pub daily_budget: Option<f64>,
    pub lifetime_budget: Option<f64>,
    pub start_time: Option<String>,
    pub stop_time: Option<String>,
    pub metrics: Option<InsightRow>,
}

pub struct FacebookAdsClient {
    client: reqwest::Client,
    api_version: String,
    audit: AuditSink,
}

impl FacebookAdsClient {
    pub fn new(audit: AuditSink) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("adsync-facebook/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("FATAL: initialize Facebook HTTP client failed");
        Self {
            client,
            api_version: CONFIG.facebook_api_version.clone(),
            audit,
        }
    }

    fn credentials<'a>(&self, store: &'a Store) -> Option<(&'a str, &'a str)> {
        Some((
            store.facebook_ad_account_id.as_deref()?,
            store.facebook_token.as_deref()?,
        ))
    }

    async fn get_once(&self, url: &str) -> Result<Value, SyncError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            if code == RATE_LIMIT_CODE {
                return Err(SyncError::RateLimited("facebook"));
            }
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown Graph API error");
            return Err(SyncError::vendor(
                "facebook",
                format!("code {code}: {message}"),
            ));
        }
        if !status.is_success() {
            return Err(SyncError::vendor(
                "facebook",
                format!("unexpected HTTP status {status}"),
            ));
        }
        Ok(body)
    }

    /// One GET with the fixed-delay rate-limit retry. Only error code 17 is
    /// retried; everything else surfaces immediately.
    async fn get_json(&self, url: &str) -> Result<Value, SyncError> {
        let policy = ConstantBuilder::default()
            .with_delay(RATE_LIMIT_DELAY)
            .with_max_times(RATE_LIMIT_MAX_RETRIES);

        (|| async { self.get_once(url).await })
            .retry(policy)
            .when(|e: &SyncError| matches!(e, SyncError::RateLimited(_)))
            .notify(|err, dur: Duration| {
                warn!("facebook rate limited ({}), retrying in {:?}", err, dur);
            })
            .await
            .map_err(|e| match e {
                SyncError::RateLimited(vendor) => SyncError::RateLimitExhausted {
                    vendor,
                    attempts: RATE_LIMIT_MAX_RETRIES,
                },
                other => other,
            })
    }

    /// Follow `paging.next` cursors until exhausted or `limit` rows
    /// collected.
    async fn get_paged(&self, first_url: String, limit: usize) -> Result<Vec<Value>, SyncError> {
        let mut rows = Vec::new();
        let mut url = Some(first_url);
        while let Some(current) = url {
            let body = self.get_json(&current).await?;
            if let Some(data) = body.get("data").and_then(|d| d.as_array()) {
                rows.extend(data.iter().cloned());
            }
            if rows.len() >= limit {
                rows.truncate(limit);
                break;
            }
            url = body
                .get("paging")
                .and_then(|p| p.get("next"))
                .and_then(|n| n.as_str())
                .map(String::from);
        }
        Ok(rows)
    }

    fn insights_url(
        &self,
        account_id: &str,
        token: &str,
        window: DateWindow,
        level: Option<InsightLevel>,
        breakdown: Option<&str>,
        entity_id: Option<&str>,
        time_increment: Option<u32>,
        page_size: usize,
    ) -> String {
        let node = match entity_id {
            Some(id) => id.to_string(),
            None => format!("act_{account_id}"),
        };
        let since = window
            .start
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "2000-01-01".to_string());
        let until = window.end.format("%Y-%m-%d").to_string();
        let mut url = format!(
            "{GRAPH_BASE}/{ver}/{node}/insights?fields={INSIGHT_FIELDS}\
             &time_range={{\"since\":\"{since}\",\"until\":\"{until}\"}}\
             &limit={page_size}&access_token={token}",
            ver = self.api_version,
        );
        if let Some(level) = level {
            url.push_str("&level=");
            url.push_str(level.as_str());
        }
        if let Some(breakdown) = breakdown {
            url.push_str("&breakdowns=");
            url.push_str(breakdown);
        }
        if let Some(increment) = time_increment {
            url.push_str(&format!("&time_increment={increment}"));
        }
        url
    }

    async fn fetch_entity_metadata(
        &self,
        account_id: &str,
        token: &str,
        level: InsightLevel,
        limit: usize,
    ) -> Result<Vec<Value>, SyncError> {
        let url = format!(
            "{GRAPH_BASE}/{ver}/act_{account_id}/{edge}?\
             fields=id,name,status,daily_budget,lifetime_budget,start_time,stop_time\
             &limit={limit}&access_token={token}",
            ver = self.api_version,
            edge = level.edge(),
        );
        self.get_paged(url, limit).await
    }

    /// Paged insight fetch without audit bracketing; the audited entry
    /// points wrap this so detail joins do not double-log.
    async fn insight_rows(
        &self,
        store: &Store,
        window: DateWindow,
        level: InsightLevel,
        breakdown: Option<&str>,
        entity_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InsightRow>, SyncError> {
        let Some((account_id, token)) = self.credentials(store) else {
            return Ok(Vec::new());
        };
        let page_size = limit.clamp(1, 100);
        let url = self.insights_url(
            account_id, token, window,
            Some(level), breakdown, entity_id,
            None, page_size,
        );
        let rows = self.get_paged(url, limit).await?;
        Ok(rows
            .iter()
            .map(|row| InsightRow::from_raw(row, level, breakdown))
            .collect())
    }

    async fn fetch_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        level: InsightLevel,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        let Some((account_id, token)) = self.credentials(store) else {
            return Ok(Vec::new());
        };
        let started = Instant::now();
        let action = format!("facebook.fetch_{}", level.edge());
        self.audit
            .log(AuditEntry::new(action.clone(), AuditStatus::Pending).store(store.id));

        let result: Result<Vec<EntityInsights>, SyncError> = async {
            let insights = self
                .insight_rows(store, window, level, None, None, limit)
                .await?;
            let mut by_id: HashMap<String, InsightRow> = insights
                .into_iter()
                .filter_map(|row| row.entity_id.clone().map(|id| (id, row)))
                .collect();

            let entities = self
                .fetch_entity_metadata(account_id, token, level, limit)
                .await?;
            Ok(entities
                .iter()
                .filter_map(|e| {
                    let id = e.get("id")?.as_str()?.to_string();
                    let metrics = by_id.remove(&id);
                    Some(EntityInsights {
                        name: e
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        status: e
                            .get("status")
                            .and_then(|s| s.as_str())
                            .map(String::from),
                        daily_budget: budget_value(e.get("daily_budget")),
                        lifetime_budget: budget_value(e.get("lifetime_budget")),
                        start_time: e
                            .get("start_time")
                            .and_then(|t| t.as_str())
                            .map(String::from),
                        stop_time: e
                            .get("stop_time")
                            .and_then(|t| t.as_str())
                            .map(String::from),
                        entity_id: id,
                        metrics,
                    })
                })
                .collect())
        }
        .await;

        let elapsed = started.elapsed().as_millis() as i64;
        match result {
            Ok(rows) => {
                self.audit.success(&action, store.id, elapsed);
                Ok(rows)
            }
            Err(e) => {
                self.audit.failure(&action, store.id, &e.to_string(), elapsed);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl FacebookApi for FacebookAdsClient {
    /// Account-level daily spend, one row per date via `time_increment=1`.
    async fn fetch_ad_spend(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailySpend>, SyncError> {
        let Some((account_id, token)) = self.credentials(store) else {
            return Ok(Vec::new());
        };
        let started = Instant::now();
        self.audit
            .log(AuditEntry::new("facebook.fetch_ad_spend", AuditStatus::Pending).store(store.id));

        let url = self.insights_url(
            account_id, token, window, None, None, None, Some(1), 500,
        );
        let result = self.get_paged(url, 10_000).await.map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let date = row
                        .get("date_start")
                        .and_then(|d| d.as_str())
                        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
                    Some(DailySpend {
                        date,
                        spend: number_field(row, "spend"),
                    })
                })
                .collect::<Vec<_>>()
        });

        let elapsed = started.elapsed().as_millis() as i64;
        match result {
            Ok(rows) => {
                self.audit.success("facebook.fetch_ad_spend", store.id, elapsed);
                Ok(rows)
            }
            Err(e) => {
                self.audit
                    .failure("facebook.fetch_ad_spend", store.id, &e.to_string(), elapsed);
                Err(e)
            }
        }
    }

    async fn fetch_insights(
        &self,
        store: &Store,
        window: DateWindow,
        level: InsightLevel,
        breakdown: Option<&str>,
        entity_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InsightRow>, SyncError> {
        if self.credentials(store).is_none() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        self.audit
            .log(AuditEntry::new("facebook.fetch_insights", AuditStatus::Pending).store(store.id));

        let result = self
            .insight_rows(store, window, level, breakdown, entity_id, limit)
            .await;

        let elapsed = started.elapsed().as_millis() as i64;
        match result {
            Ok(rows) => {
                self.audit.success("facebook.fetch_insights", store.id, elapsed);
                Ok(rows)
            }
            Err(e) => {
                self.audit
                    .failure("facebook.fetch_insights", store.id, &e.to_string(), elapsed);
                Err(e)
            }
        }
    }

    async fn fetch_campaigns_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        self.fetch_with_details(store, window, InsightLevel::Campaign, limit)
            .await
    }

    async fn fetch_adsets_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        self.fetch_with_details(store, window, InsightLevel::Adset, limit)
            .await
    }

    async fn fetch_ads_with_details(
        &self,
        store: &Store,
        window: DateWindow,
        limit: usize,
    ) -> Result<Vec<EntityInsights>, SyncError> {
        self.fetch_with_details(store, window, InsightLevel::Ad, limit)
            .await
    }
}

impl InsightRow {
    /// Map one raw insight object, computing the derived ratios with
    /// zero-guards. Ratios are rounded to 2 decimals; CTRs are percentages.
    pub fn from_raw(row: &Value, level: InsightLevel, breakdown: Option<&str>) -> Self {
        let spend = number_field(row, "spend");
        let reach = int_field(row, "reach");
        let impressions = int_field(row, "impressions");
        let clicks = int_field(row, "clicks");
        let link_clicks = int_field(row, "inline_link_clicks");
        let actions = parse_actions(row.get("actions"));
        let objective = row.get("objective").and_then(|o| o.as_str());
        let results = results_for_objective(objective, &actions, link_clicks);
        let roas = row
            .get("purchase_roas")
            .and_then(|r| r.as_array())
            .and_then(|a| a.first())
            .map(|entry| number_field(entry, "value"))
            .unwrap_or(0.0);

        Self {
            entity_id: row
                .get(level.id_field())
                .and_then(|v| v.as_str())
                .map(String::from),
            entity_name: row
                .get(level.name_field())
                .and_then(|v| v.as_str())
                .map(String::from),
            date_start: date_field(row, "date_start"),
            date_stop: date_field(row, "date_stop"),
            breakdown: breakdown.and_then(|key| {
                row.get(key).and_then(|v| v.as_str()).map(String::from)
            }),
            spend,
            reach,
            impressions,
            frequency: number_field(row, "frequency"),
            clicks,
            link_clicks,
            results,
            cpm: ratio(spend * 1000.0, impressions as f64),
            cpc: ratio(spend, clicks as f64),
            ctr: percentage(clicks as f64, impressions as f64),
            link_ctr: percentage(link_clicks as f64, impressions as f64),
            cost_per_result: ratio(spend, results as f64),
            roas: round2(roas),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// 0 when the denominator is 0; never NaN/Infinity.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator / denominator)
    }
}

/// Ratio expressed as a percentage, rounded to 2 decimals.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        round2(numerator * 100.0 / denominator)
    }
}

/// Pick the action count matching the entity's stated objective. Falls back
/// to purchases, then link clicks, when the objective is absent or
/// unrecognized.
pub fn results_for_objective(
    objective: Option<&str>,
    actions: &[(String, f64)],
    link_clicks: i64,
) -> i64 {
    let find = |types: &[&str]| -> Option<f64> {
        actions
            .iter()
            .find(|(t, _)| types.contains(&t.as_str()))
            .map(|(_, v)| *v)
    };

    let upper = objective.map(str::to_ascii_uppercase);
    let picked = match upper.as_deref() {
        Some(o) if o.contains("SALES") || o.contains("PURCHASE") || o.contains("CONVERSIONS") => {
            find(&["omni_purchase", "purchase"])
        }
        Some(o) if o.contains("LEAD") => find(&["lead", "onsite_conversion.lead_grouped"]),
        Some(o) if o.contains("TRAFFIC") || o.contains("LINK_CLICK") => {
            find(&["link_click"]).or(Some(link_clicks as f64))
        }
        Some(o) if o.contains("ENGAGEMENT") => find(&["post_engagement", "page_engagement"]),
        Some(o) if o.contains("APP") => find(&["omni_app_install", "mobile_app_install"]),
        Some(o) if o.contains("VIDEO") => find(&["video_view"]),
        _ => find(&["omni_purchase", "purchase"]).or(Some(link_clicks as f64)),
    };
    picked.unwrap_or(0.0) as i64
}

fn parse_actions(actions: Option<&Value>) -> Vec<(String, f64)> {
    actions
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let action_type = entry.get("action_type")?.as_str()?.to_string();
                    Some((action_type, number_field(entry, "value")))
                })
                .collect()
        })
        .unwrap_or_default()
}

// Graph API numbers arrive as strings more often than not.
fn number_field(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn int_field(row: &Value, key: &str) -> i64 {
    number_field(row, key) as i64
}

fn date_field(row: &Value, key: &str) -> Option<NaiveDate> {
    row.get(key)
        .and_then(|d| d.as_str())
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Budgets are reported in minor currency units.
fn budget_value(v: Option<&Value>) -> Option<f64> {
    let raw = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(raw / 100.0)
}
