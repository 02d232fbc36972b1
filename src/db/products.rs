use crate::db::models::ProductMetric;
use crate::db::stores::SqlitePool;
use crate::error::SyncError;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Clone)]
pub struct ProductMetricsStorage {
    pool: SqlitePool,
}

impl ProductMetricsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Zero all existing rows for the store in place. Run before re-applying
    /// a freshly fetched batch so repeated syncs never double count; ids and
    /// product metadata survive the reset.
    pub async fn reset_for_store(&self, store_id: i64) -> Result<u64, SyncError> {
        let res = sqlx::query(
            "UPDATE product_metrics SET total_quantity_sold = 0, total_revenue = 0 \
             WHERE store_id = ?",
        )
        .bind(store_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    /// Increment-on-upsert: quantity and revenue accumulate, metadata and
    /// last_sync_date are replaced. Order-independent over a batch.
    pub async fn apply(&self, batch: &[ProductMetric]) -> Result<(), SyncError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for item in batch {
            sqlx::query(
                r#"
                INSERT INTO product_metrics (
                    store_id, product_id, product_name, product_image,
                    product_url, total_quantity_sold, total_revenue, last_sync_date
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(store_id, product_id) DO UPDATE SET
                    product_name=excluded.product_name,
                    product_image=excluded.product_image,
                    product_url=excluded.product_url,
                    total_quantity_sold=total_quantity_sold + excluded.total_quantity_sold,
                    total_revenue=total_revenue + excluded.total_revenue,
                    last_sync_date=excluded.last_sync_date
                "#,
            )
            .bind(item.store_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(&item.product_image)
            .bind(&item.product_url)
            .bind(item.total_quantity_sold)
            .bind(item.total_revenue)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_store(&self, store_id: i64) -> Result<Vec<ProductMetric>, SyncError> {
        let rows = sqlx::query(
            r#"SELECT store_id, product_id, product_name, product_image, product_url,
               total_quantity_sold, total_revenue, last_sync_date
               FROM product_metrics WHERE store_id = ?
               ORDER BY total_revenue DESC"#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    pub async fn delete_by_store_id(&self, store_id: i64) -> Result<u64, SyncError> {
        let res = sqlx::query("DELETE FROM product_metrics WHERE store_id = ?")
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    fn row_to_model(row: SqliteRow) -> Result<ProductMetric, SyncError> {
        let last_sync: Option<String> = row.try_get("last_sync_date")?;
        let last_sync_date = match last_sync {
            Some(s) => Some(
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Ok(ProductMetric {
            store_id: row.try_get("store_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            product_image: row.try_get("product_image")?,
            product_url: row.try_get("product_url")?,
            total_quantity_sold: row.try_get("total_quantity_sold")?,
            total_revenue: row.try_get("total_revenue")?,
            last_sync_date,
        })
    }
}
