//! Idempotency ledger repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};

use super::model::{ClaimOutcome, MessageKey, ProcessedEmail, compare_hashes};
use crate::db::parse_timestamp;
use crate::{Result, SyncSourceId};

/// Repository for the processed-email ledger.
#[derive(Debug, Clone)]
pub struct ProcessedEmailRepository {
    pool: SqlitePool,
}

impl ProcessedEmailRepository {
    /// Create a repository on a shared pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim a message inside the caller's transaction.
    ///
    /// The unique `(sync_source_id, message_uid)` constraint decides the race:
    /// a losing concurrent claim sees `AlreadyProcessed`. The insert happens
    /// before the dead-letter check so the write lock is held while checking.
    /// On any outcome other than [`ClaimOutcome::Claimed`] the caller must roll
    /// back.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn claim(
        conn: &mut SqliteConnection,
        key: MessageKey,
        content_hash: Option<&str>,
    ) -> Result<ClaimOutcome> {
        let result = sqlx::query(
            r"
            INSERT INTO processed_emails (sync_source_id, message_uid, content_hash, processed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(sync_source_id, message_uid) DO NOTHING
            ",
        )
        .bind(key.sync_source_id.0)
        .bind(key.message_uid)
        .bind(content_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let stored: Option<String> = sqlx::query_scalar(
                "SELECT content_hash FROM processed_emails WHERE sync_source_id = ? AND message_uid = ?",
            )
            .bind(key.sync_source_id.0)
            .bind(key.message_uid)
            .fetch_one(&mut *conn)
            .await?;
            return Ok(compare_hashes(stored, content_hash));
        }

        let id = result.last_insert_rowid();
        let quarantined: Option<Option<String>> = sqlx::query_scalar(
            "SELECT content_hash FROM email_alert_dlq WHERE sync_source_id = ? AND message_uid = ?",
        )
        .bind(key.sync_source_id.0)
        .bind(key.message_uid)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(match quarantined {
            None => ClaimOutcome::Claimed(id),
            Some(stored) => match compare_hashes(stored, content_hash) {
                ClaimOutcome::AlreadyProcessed => ClaimOutcome::Quarantined,
                mismatch => mismatch,
            },
        })
    }

    /// Whether the ledger has an entry for this message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, key: MessageKey) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// The ledger entry for a message, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, key: MessageKey) -> Result<Option<ProcessedEmail>> {
        let row = sqlx::query(
            r"
            SELECT id, sync_source_id, message_uid, content_hash, processed_at
            FROM processed_emails
            WHERE sync_source_id = ? AND message_uid = ?
            ",
        )
        .bind(key.sync_source_id.0)
        .bind(key.message_uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_processed).transpose()
    }

    /// Number of handled messages recorded for a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_source(&self, id: SyncSourceId) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM processed_emails WHERE sync_source_id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_processed(row: &SqliteRow) -> Result<ProcessedEmail> {
    let processed_at: String = row.get("processed_at");
    Ok(ProcessedEmail {
        id: row.get("id"),
        key: MessageKey::new(SyncSourceId(row.get("sync_source_id")), row.get("message_uid")),
        content_hash: row.get("content_hash"),
        processed_at: parse_timestamp(&processed_at)?,
    })
}
