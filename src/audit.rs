//! Fire-and-forget audit sink.
//!
//! `log()` never blocks and never fails the caller: entries go over an
//! unbounded channel to a background writer that swallows its own
//! persistence errors.

use crate::db::models::{AuditEntry, AuditStatus};
use crate::db::stores::SqlitePool;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};
use tracing::warn;

#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl AuditSink {
    /// Spawn the background writer and return the sink handle.
    pub fn spawn(pool: SqlitePool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<AuditEntry>();
        tokio::spawn(async move {
            let mut entries = UnboundedReceiverStream::new(rx);
            while let Some(entry) = entries.next().await {
                if let Err(e) = write_entry(&pool, &entry).await {
                    warn!(action = %entry.action, error = %e, "audit write failed; dropping entry");
                }
            }
        });
        Self { tx }
    }

    /// A sink whose writer task is already gone; every log call is a no-op.
    /// Handy for tests that do not care about auditing.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel::<AuditEntry>();
        Self { tx }
    }

    pub fn log(&self, entry: AuditEntry) {
        // A closed channel means shutdown is in progress; nothing to do.
        let _ = self.tx.send(entry);
    }

    pub fn success(&self, action: &str, store_id: i64, duration_ms: i64) {
        self.log(
            AuditEntry::new(action, AuditStatus::Success)
                .store(store_id)
                .duration_ms(duration_ms),
        );
    }

    pub fn failure(&self, action: &str, store_id: i64, error: &str, duration_ms: i64) {
        self.log(
            AuditEntry::new(action, AuditStatus::Failure)
                .store(store_id)
                .error(error)
                .duration_ms(duration_ms),
        );
    }
}

async fn write_entry(pool: &SqlitePool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    let metadata = entry
        .metadata
        .as_ref()
        .map(|m| m.to_string());
    sqlx::query(
        r#"
        INSERT INTO audit_logs (action, status, store_id, metadata, error, duration_ms, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.action)
    .bind(entry.status.as_str())
    .bind(entry.store_id)
    .bind(metadata)
    .bind(&entry.error)
    .bind(entry.duration_ms)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
