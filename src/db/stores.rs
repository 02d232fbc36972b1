use crate::db::models::Store;
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

pub type SqlitePool = Pool<Sqlite>;

const STORE_COLUMNS: &str = "id, name, shopify_url, shopify_token, \
     facebook_ad_account_id, facebook_token, google_customer_id, \
     google_refresh_token, google_access_token, google_token_expiry";

#[derive(Clone)]
pub struct StoreStorage {
    pool: SqlitePool,
}

impl StoreStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<Store>, SyncError> {
        let rows = sqlx::query(&format!("SELECT {STORE_COLUMNS} FROM stores ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    pub async fn find_one(&self, id: i64) -> Result<Store, SyncError> {
        let row = sqlx::query(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Self::row_to_model(row),
            None => Err(SyncError::StoreNotFound(id)),
        }
    }

    pub async fn insert(&self, store: &Store) -> Result<i64, SyncError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stores (
                name, shopify_url, shopify_token, facebook_ad_account_id,
                facebook_token, google_customer_id, google_refresh_token,
                google_access_token, google_token_expiry
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&store.name)
        .bind(&store.shopify_url)
        .bind(&store.shopify_token)
        .bind(&store.facebook_ad_account_id)
        .bind(&store.facebook_token)
        .bind(&store.google_customer_id)
        .bind(&store.google_refresh_token)
        .bind(&store.google_access_token)
        .bind(store.google_token_expiry.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Persist a refreshed Google access token back onto the store record.
    pub async fn update_google_token(
        &self,
        id: i64,
        access_token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        sqlx::query(
            "UPDATE stores SET google_access_token = ?, google_token_expiry = ? WHERE id = ?",
        )
        .bind(access_token)
        .bind(expiry.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<Store, SyncError> {
        let expiry_str: Option<String> = row.try_get("google_token_expiry")?;
        let google_token_expiry = match expiry_str {
            Some(s) => Some(
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Ok(Store {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            shopify_url: row.try_get("shopify_url")?,
            shopify_token: row.try_get("shopify_token")?,
            facebook_ad_account_id: row.try_get("facebook_ad_account_id")?,
            facebook_token: row.try_get("facebook_token")?,
            google_customer_id: row.try_get("google_customer_id")?,
            google_refresh_token: row.try_get("google_refresh_token")?,
            google_access_token: row.try_get("google_access_token")?,
            google_token_expiry,
        })
    }
}
