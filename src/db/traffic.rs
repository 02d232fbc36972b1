use crate::db::models::TrafficMetric;
use crate::db::stores::SqlitePool;
use crate::error::SyncError;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct TrafficMetricsStorage {
    pool: SqlitePool,
}

impl TrafficMetricsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete rows whose window start falls on/after the new window's start.
    /// Rows from older windows are history and stay untouched.
    pub async fn delete_from_window_start(
        &self,
        store_id: i64,
        window_start: NaiveDate,
    ) -> Result<u64, SyncError> {
        let res = sqlx::query(
            "DELETE FROM traffic_metrics WHERE store_id = ? AND window_start >= ?",
        )
        .bind(store_id)
        .bind(window_start.format(DATE_FMT).to_string())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    /// Full-replace upsert keyed (store_id, landing_page_path, window_start);
    /// never merged field-by-field with stale values.
    pub async fn replace(&self, rows: &[TrafficMetric]) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO traffic_metrics (
                    store_id, landing_page_path, landing_page_type, window_start,
                    window_end, online_store_visitors, sessions,
                    sessions_with_cart_additions, sessions_reached_checkout
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(store_id, landing_page_path, window_start) DO UPDATE SET
                    landing_page_type=excluded.landing_page_type,
                    window_end=excluded.window_end,
                    online_store_visitors=excluded.online_store_visitors,
                    sessions=excluded.sessions,
                    sessions_with_cart_additions=excluded.sessions_with_cart_additions,
                    sessions_reached_checkout=excluded.sessions_reached_checkout
                "#,
            )
            .bind(row.store_id)
            .bind(&row.landing_page_path)
            .bind(&row.landing_page_type)
            .bind(row.window_start.format(DATE_FMT).to_string())
            .bind(row.window_end.format(DATE_FMT).to_string())
            .bind(row.online_store_visitors)
            .bind(row.sessions)
            .bind(row.sessions_with_cart_additions)
            .bind(row.sessions_reached_checkout)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_store(&self, store_id: i64) -> Result<Vec<TrafficMetric>, SyncError> {
        let rows = sqlx::query(
            r#"SELECT store_id, landing_page_path, landing_page_type, window_start,
               window_end, online_store_visitors, sessions,
               sessions_with_cart_additions, sessions_reached_checkout
               FROM traffic_metrics WHERE store_id = ?
               ORDER BY window_start ASC, sessions DESC"#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    pub async fn delete_by_store_id(&self, store_id: i64) -> Result<u64, SyncError> {
        let res = sqlx::query("DELETE FROM traffic_metrics WHERE store_id = ?")
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    fn row_to_model(row: SqliteRow) -> Result<TrafficMetric, SyncError> {
        let start_str: String = row.try_get("window_start")?;
        let end_str: String = row.try_get("window_end")?;
        let window_start = NaiveDate::parse_from_str(&start_str, DATE_FMT)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let window_end = NaiveDate::parse_from_str(&end_str, DATE_FMT)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(TrafficMetric {
            store_id: row.try_get("store_id")?,
            landing_page_path: row.try_get("landing_page_path")?,
            landing_page_type: row.try_get("landing_page_type")?,
            window_start,
            window_end,
            online_store_visitors: row.try_get("online_store_visitors")?,
            sessions: row.try_get("sessions")?,
            sessions_with_cart_additions: row.try_get("sessions_with_cart_additions")?,
            sessions_reached_checkout: row.try_get("sessions_reached_checkout")?,
        })
    }
}
