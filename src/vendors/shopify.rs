//! Shopify Admin GraphQL client: daily order totals, per-product sales and
//! ShopifyQL landing-page traffic.

use crate::audit::AuditSink;
use crate::config::CONFIG;
use crate::db::models::{AuditEntry, AuditStatus, Store};
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use crate::vendors::{DailyOrders, LandingPageTraffic, ProductSales, ShopifyApi};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const PAGE_SIZE: i64 = 50;

pub struct ShopifyClient {
    client: reqwest::Client,
    api_version: String,
    day_delay: Duration,
    audit: AuditSink,
}

impl ShopifyClient {
    pub fn new(audit: AuditSink) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("adsync-shopify/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("FATAL: initialize Shopify HTTP client failed");
        Self {
            client,
            api_version: CONFIG.shopify_api_version.clone(),
            day_delay: Duration::from_millis(CONFIG.shopify_day_delay_ms),
            audit,
        }
    }

    fn endpoint(&self, store: &Store) -> Result<(String, String), SyncError> {
        let shop = store
            .shopify_url
            .as_deref()
            .ok_or_else(|| SyncError::vendor("shopify", "store has no shopify_url"))?;
        let token = store
            .shopify_token
            .as_deref()
            .ok_or_else(|| SyncError::vendor("shopify", "store has no shopify_token"))?;
        Ok((
            format!(
                "https://{shop}/admin/api/{}/graphql.json",
                self.api_version
            ),
            token.to_string(),
        ))
    }

    async fn execute(
        &self,
        store: &Store,
        query: &str,
        variables: Value,
    ) -> Result<Value, SyncError> {
        let (url, token) = self.endpoint(store)?;
        let resp = self
            .client
            .post(&url)
            .header("X-Shopify-Access-Token", token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?;
        let body: Value = resp.json().await?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array())
            && !errors.is_empty()
        {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect();
            return Err(SyncError::vendor("shopify", messages.join("; ")));
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| SyncError::vendor("shopify", "GraphQL response missing data"))
    }

    /// Page through the orders connection for one search query, invoking
    /// `on_order` per order node until exhausted.
    async fn for_each_order<F>(
        &self,
        store: &Store,
        search_query: Option<String>,
        mut on_order: F,
    ) -> Result<(), SyncError>
    where
        F: FnMut(OrderNode),
    {
        let mut cursor: Option<String> = None;
        loop {
            let variables = json!({
                "first": PAGE_SIZE,
                "after": cursor,
                "query": search_query,
            });
            let data = self.execute(store, ORDERS_QUERY, variables).await?;
            let connection: OrderConnection = serde_json::from_value(
                data.get("orders")
                    .cloned()
                    .ok_or_else(|| SyncError::vendor("shopify", "response missing orders"))?,
            )?;

            for edge in connection.edges {
                on_order(edge.node);
            }

            if connection.page_info.has_next_page {
                cursor = connection.page_info.end_cursor;
            } else {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShopifyApi for ShopifyClient {
    /// One calendar day at a time across the window (inclusive), paginating
    /// the orders query per day and summing order count, value and line-item
    /// quantity. A fixed delay separates days to avoid hammering the API.
    async fn fetch_orders(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<DailyOrders>, SyncError> {
        if !store.has_shopify() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        self.audit
            .log(AuditEntry::new("shopify.fetch_orders", AuditStatus::Pending).store(store.id));

        let days = window.days();
        let mut out = Vec::with_capacity(days.len());
        for (i, day) in days.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.day_delay).await;
            }
            let result = self.fetch_orders_for_day(store, *day).await;
            match result {
                Ok(daily) => out.push(daily),
                Err(e) => {
                    self.audit.failure(
                        "shopify.fetch_orders",
                        store.id,
                        &e.to_string(),
                        started.elapsed().as_millis() as i64,
                    );
                    return Err(e);
                }
            }
        }

        self.audit.success(
            "shopify.fetch_orders",
            store.id,
            started.elapsed().as_millis() as i64,
        );
        info!(store_id = store.id, days = out.len(), "shopify orders fetched");
        Ok(out)
    }

    /// Paginate the full window without day-bucketing and roll line items up
    /// by product. Revenue per line item is allocated proportionally:
    /// quantity / total items in the order x the order total. This
    /// misattributes revenue when an order mixes differently-priced items;
    /// the true line price is not available from this query.
    async fn fetch_product_sales(
        &self,
        store: &Store,
        window: DateWindow,
    ) -> Result<Vec<ProductSales>, SyncError> {
        if !store.has_shopify() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        self.audit.log(
            AuditEntry::new("shopify.fetch_product_sales", AuditStatus::Pending).store(store.id),
        );

        let search_query = window
            .start
            .map(|start| order_search_query(start, window.end));

        let mut by_product: BTreeMap<String, ProductSales> = BTreeMap::new();
        let result = self
            .for_each_order(store, search_query, |order| {
                let order_total = order.total_price();
                let total_items: i64 = order
                    .line_items
                    .edges
                    .iter()
                    .map(|e| e.node.quantity)
                    .sum();
                for edge in order.line_items.edges {
                    let item = edge.node;
                    let Some(product) = item.product else {
                        // Deleted products have no product reference.
                        continue;
                    };
                    let revenue = allocate_revenue(order_total, item.quantity, total_items);
                    let entry =
                        by_product
                            .entry(product.id.clone())
                            .or_insert_with(|| ProductSales {
                                product_id: product.id.clone(),
                                product_name: product.title.clone(),
                                product_image: product.image_url(),
                                product_url: product.online_store_url.clone(),
                                quantity_sold: 0,
                                revenue: 0.0,
                            });
                    entry.quantity_sold += item.quantity;
                    entry.revenue += revenue;
                }
            })
            .await;

        if let Err(e) = result {
            self.audit.failure(
                "shopify.fetch_product_sales",
                store.id,
                &e.to_string(),
                started.elapsed().as_millis() as i64,
            );
            return Err(e);
        }

        self.audit.success(
            "shopify.fetch_product_sales",
            store.id,
            started.elapsed().as_millis() as i64,
        );
        Ok(by_product.into_values().collect())
    }

    /// One ShopifyQL query; returned rows are mapped positionally.
    async fn fetch_traffic_analytics(
        &self,
        store: &Store,
        days_back: i64,
        limit: usize,
    ) -> Result<Vec<LandingPageTraffic>, SyncError> {
        if !store.has_shopify() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        self.audit.log(
            AuditEntry::new("shopify.fetch_traffic", AuditStatus::Pending).store(store.id),
        );

        let shopifyql = format!(
            "FROM sessions \
             SHOW online_store_visitors, sessions, sessions_with_cart_additions, \
             sessions_that_reached_checkout \
             GROUP BY landing_page_type, landing_page_path \
             SINCE -{days_back}d ORDER BY sessions DESC LIMIT {limit}"
        );
        debug!(store_id = store.id, query = %shopifyql, "executing shopifyql");

        let result: Result<Vec<LandingPageTraffic>, SyncError> = async {
            let data = self
                .execute(store, SHOPIFYQL_QUERY, json!({ "query": shopifyql }))
                .await?;
            let response: ShopifyqlResponse = serde_json::from_value(
                data.get("shopifyqlQuery")
                    .cloned()
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| {
                        SyncError::vendor("shopify", "ShopifyQL query returned no response")
                    })?,
            )?;
            if !response.parse_errors.is_empty() {
                let messages: Vec<String> = response
                    .parse_errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown parse error")
                            .to_string()
                    })
                    .collect();
                return Err(SyncError::vendor(
                    "shopify",
                    format!("ShopifyQL parse errors: {}", messages.join("; ")),
                ));
            }
            let rows = response
                .table_data
                .and_then(|td| td.rows.as_array().cloned())
                .unwrap_or_default();
            Ok(rows.iter().filter_map(traffic_row_from_values).collect())
        }
        .await;

        match result {
            Ok(rows) => {
                self.audit.success(
                    "shopify.fetch_traffic",
                    store.id,
                    started.elapsed().as_millis() as i64,
                );
                Ok(rows)
            }
            Err(e) => {
                self.audit.failure(
                    "shopify.fetch_traffic",
                    store.id,
                    &e.to_string(),
                    started.elapsed().as_millis() as i64,
                );
                Err(e)
            }
        }
    }
}

impl ShopifyClient {
    async fn fetch_orders_for_day(
        &self,
        store: &Store,
        day: NaiveDate,
    ) -> Result<DailyOrders, SyncError> {
        let mut daily = DailyOrders {
            date: day,
            sold_orders: 0,
            order_value: 0.0,
            sold_items: 0,
        };
        let search_query = order_search_query(day, day);
        self.for_each_order(store, Some(search_query), |order| {
            daily.sold_orders += 1;
            daily.order_value += order.total_price();
            daily.sold_items += order
                .line_items
                .edges
                .iter()
                .map(|e| e.node.quantity)
                .sum::<i64>();
        })
        .await?;
        Ok(daily)
    }
}

/// Proportional allocation of an order's total to one line item. An
/// approximation accepted for dashboard-grade accuracy.
pub fn allocate_revenue(order_total: f64, quantity: i64, total_items: i64) -> f64 {
    if total_items == 0 {
        return 0.0;
    }
    order_total * quantity as f64 / total_items as f64
}

fn order_search_query(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "created_at:>='{start}T00:00:00Z' AND created_at:<='{end}T23:59:59Z'",
        start = start.format("%Y-%m-%d"),
        end = end.format("%Y-%m-%d"),
    )
}

fn traffic_row_from_values(row: &Value) -> Option<LandingPageTraffic> {
    let cells = row.as_array()?;
    Some(LandingPageTraffic {
        landing_page_type: cell_str(cells.first()?),
        landing_page_path: cell_str(cells.get(1)?),
        online_store_visitors: cell_i64(cells.get(2)?),
        sessions: cell_i64(cells.get(3)?),
        sessions_with_cart_additions: cell_i64(cells.get(4)?),
        sessions_reached_checkout: cell_i64(cells.get(5)?),
    })
}

fn cell_str(v: &Value) -> String {
    v.as_str().unwrap_or_default().to_string()
}

// ShopifyQL table cells come back as strings or numbers depending on column.
fn cell_i64(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

const ORDERS_QUERY: &str = r#"
query Orders($first: Int!, $after: String, $query: String) {
  orders(first: $first, after: $after, query: $query) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        createdAt
        currentTotalPriceSet {
          shopMoney {
            amount
          }
        }
        lineItems(first: 100) {
          edges {
            node {
              quantity
              product {
                id
                title
                onlineStoreUrl
                featuredMedia {
                  preview {
                    image {
                      url
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const SHOPIFYQL_QUERY: &str = r#"
query Shopifyql($query: String!) {
  shopifyqlQuery(query: $query) {
    __typename
    ... on TableResponse {
      tableData {
        columns {
          name
        }
        rows
      }
    }
    parseErrors {
      message
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderConnection {
    page_info: PageInfo,
    edges: Vec<Edge<OrderNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderNode {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    created_at: Option<DateTime<Utc>>,
    current_total_price_set: Option<MoneyBag>,
    #[serde(default = "empty_line_items")]
    line_items: LineItemConnection,
}

fn empty_line_items() -> LineItemConnection {
    LineItemConnection { edges: Vec::new() }
}

impl OrderNode {
    fn total_price(&self) -> f64 {
        self.current_total_price_set
            .as_ref()
            .and_then(|m| m.shop_money.amount.parse().ok())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoneyBag {
    shop_money: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct LineItemConnection {
    edges: Vec<Edge<LineItemNode>>,
}

#[derive(Debug, Deserialize)]
struct LineItemNode {
    quantity: i64,
    product: Option<ProductRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRef {
    id: String,
    title: String,
    online_store_url: Option<String>,
    featured_media: Option<FeaturedMedia>,
}

impl ProductRef {
    fn image_url(&self) -> Option<String> {
        self.featured_media
            .as_ref()?
            .preview
            .as_ref()?
            .image
            .as_ref()
            .map(|i| i.url.clone())
    }
}

#[derive(Debug, Deserialize)]
struct FeaturedMedia {
    preview: Option<MediaPreview>,
}

#[derive(Debug, Deserialize)]
struct MediaPreview {
    image: Option<MediaImage>,
}

#[derive(Debug, Deserialize)]
struct MediaImage {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShopifyqlResponse {
    table_data: Option<TableData>,
    #[serde(default)]
    parse_errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TableData {
    rows: Value,
}
