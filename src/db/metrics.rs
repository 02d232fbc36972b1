use crate::db::models::{AggregateReport, AggregateTotals, DailyStoreMetric, StoreAggregate};
use crate::db::stores::SqlitePool;
use crate::error::SyncError;
use crate::sync::window::DateWindow;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct MetricsStorage {
    pool: SqlitePool,
}

impl MetricsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert keyed by (store_id, date); a re-sync fully replaces the five
    /// metric fields rather than accumulating.
    pub async fn create_or_update(&self, record: &DailyStoreMetric) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            INSERT INTO daily_store_metrics (
                store_id, date, facebook_meta_spend, google_ad_spend,
                shopify_sold_orders, shopify_order_value, shopify_sold_items
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(store_id, date) DO UPDATE SET
                facebook_meta_spend=excluded.facebook_meta_spend,
                google_ad_spend=excluded.google_ad_spend,
                shopify_sold_orders=excluded.shopify_sold_orders,
                shopify_order_value=excluded.shopify_order_value,
                shopify_sold_items=excluded.shopify_sold_items
            "#,
        )
        .bind(record.store_id)
        .bind(record.date.format(DATE_FMT).to_string())
        .bind(record.facebook_meta_spend)
        .bind(record.google_ad_spend)
        .bind(record.shopify_sold_orders)
        .bind(record.shopify_order_value)
        .bind(record.shopify_sold_items)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rows for one store within the window, ascending by date.
    pub async fn find_by_store(
        &self,
        store_id: i64,
        window: DateWindow,
    ) -> Result<Vec<DailyStoreMetric>, SyncError> {
        let end = window.end.format(DATE_FMT).to_string();
        let rows = match window.start {
            Some(start) => {
                sqlx::query(
                    r#"SELECT store_id, date, facebook_meta_spend, google_ad_spend,
                       shopify_sold_orders, shopify_order_value, shopify_sold_items
                       FROM daily_store_metrics
                       WHERE store_id = ? AND date >= ? AND date <= ?
                       ORDER BY date ASC"#,
                )
                .bind(store_id)
                .bind(start.format(DATE_FMT).to_string())
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT store_id, date, facebook_meta_spend, google_ad_spend,
                       shopify_sold_orders, shopify_order_value, shopify_sold_items
                       FROM daily_store_metrics
                       WHERE store_id = ? AND date <= ?
                       ORDER BY date ASC"#,
                )
                .bind(store_id)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(Self::row_to_model).collect()
    }

    /// Group matching rows by store, sum the five fields, then reduce across
    /// stores into overall totals. `store_ids = None` covers all stores.
    pub async fn aggregate(
        &self,
        window: DateWindow,
        store_ids: Option<&[i64]>,
    ) -> Result<AggregateReport, SyncError> {
        // An explicit empty filter can match nothing; IN () is not valid SQL.
        if store_ids.is_some_and(|ids| ids.is_empty()) {
            return Ok(AggregateReport {
                stores: Vec::new(),
                totals: AggregateTotals::default(),
            });
        }

        let mut sql = String::from(
            "SELECT store_id, date, facebook_meta_spend, google_ad_spend, \
             shopify_sold_orders, shopify_order_value, shopify_sold_items \
             FROM daily_store_metrics WHERE date <= ?",
        );
        if window.start.is_some() {
            sql.push_str(" AND date >= ?");
        }
        if let Some(ids) = store_ids {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND store_id IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY store_id, date");

        let mut query = sqlx::query(&sql).bind(window.end.format(DATE_FMT).to_string());
        if let Some(start) = window.start {
            query = query.bind(start.format(DATE_FMT).to_string());
        }
        if let Some(ids) = store_ids {
            for id in ids {
                query = query.bind(*id);
            }
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut per_store: BTreeMap<i64, StoreAggregate> = BTreeMap::new();
        for row in rows {
            let record = Self::row_to_model(row)?;
            let agg = per_store
                .entry(record.store_id)
                .or_insert_with(|| StoreAggregate {
                    store_id: record.store_id,
                    facebook_meta_spend: 0.0,
                    google_ad_spend: 0.0,
                    shopify_sold_orders: 0,
                    shopify_order_value: 0.0,
                    shopify_sold_items: 0,
                });
            agg.facebook_meta_spend += record.facebook_meta_spend;
            agg.google_ad_spend += record.google_ad_spend;
            agg.shopify_sold_orders += record.shopify_sold_orders;
            agg.shopify_order_value += record.shopify_order_value;
            agg.shopify_sold_items += record.shopify_sold_items;
        }

        let mut totals = AggregateTotals::default();
        for agg in per_store.values() {
            totals.facebook_meta_spend += agg.facebook_meta_spend;
            totals.google_ad_spend += agg.google_ad_spend;
            totals.shopify_sold_orders += agg.shopify_sold_orders;
            totals.shopify_order_value += agg.shopify_order_value;
            totals.shopify_sold_items += agg.shopify_sold_items;
        }

        Ok(AggregateReport {
            stores: per_store.into_values().collect(),
            totals,
        })
    }

    /// Cascade cleanup when a store is removed.
    pub async fn delete_by_store_id(&self, store_id: i64) -> Result<u64, SyncError> {
        let res = sqlx::query("DELETE FROM daily_store_metrics WHERE store_id = ?")
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    fn row_to_model(row: SqliteRow) -> Result<DailyStoreMetric, SyncError> {
        let date_str: String = row.try_get("date")?;
        let date: NaiveDate = NaiveDate::parse_from_str(&date_str, DATE_FMT)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(DailyStoreMetric {
            store_id: row.try_get("store_id")?,
            date,
            facebook_meta_spend: row.try_get("facebook_meta_spend")?,
            google_ad_spend: row.try_get("google_ad_spend")?,
            shopify_sold_orders: row.try_get("shopify_sold_orders")?,
            shopify_order_value: row.try_get("shopify_order_value")?,
            shopify_sold_items: row.try_get("shopify_sold_items")?,
        })
    }
}
