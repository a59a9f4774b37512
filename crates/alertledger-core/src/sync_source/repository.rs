//! Sync source storage repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::{info, warn};

use super::model::{NewSyncSource, SyncSource, SyncSourceStatus};
use crate::db::{parse_optional_timestamp, parse_timestamp};
use crate::{AccountId, AccountType, Bank, Result, SyncSourceId, UserId};

const COLUMNS: &str = "id, user_id, account_id, bank, account_type, email_address, \
                       imap_credentials, status, last_error, last_processed_uid, \
                       last_synced_at, is_active, created_at";

/// Repository for sync source configuration and status.
#[derive(Debug, Clone)]
pub struct SyncSourceRepository {
    pool: SqlitePool,
}

impl SyncSourceRepository {
    /// Create a repository on a shared pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create(&self, source: &NewSyncSource) -> Result<SyncSource> {
        let result = sqlx::query(
            r"
            INSERT INTO sync_sources
                (user_id, account_id, bank, account_type, email_address, imap_credentials, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(source.user_id.0)
        .bind(source.account_id.0)
        .bind(source.bank.as_str())
        .bind(source.account_type.as_str())
        .bind(&source.email_address)
        .bind(source.imap_credentials.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = SyncSourceId(result.last_insert_rowid());
        info!(%id, bank = source.bank.as_str(), "Created sync source");
        self.get(id)
            .await?
            .ok_or(crate::Error::SyncSourceNotFound(id))
    }

    /// Get a sync source by ID, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: SyncSourceId) -> Result<Option<SyncSource>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM sync_sources WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_source).transpose()
    }

    /// All sources not soft-deleted, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active(&self) -> Result<Vec<SyncSource>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM sync_sources WHERE is_active = 1 ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_source).collect()
    }

    /// A user's sources not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active_for_user(&self, user_id: UserId) -> Result<Vec<SyncSource>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM sync_sources WHERE user_id = ? AND is_active = 1 ORDER BY id ASC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_source).collect()
    }

    /// Move a source to the error state after an infrastructure failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_error(&self, id: SyncSourceId, message: &str) -> Result<()> {
        warn!(%id, error = message, "Sync source entered error state");
        sqlx::query("UPDATE sync_sources SET status = ?, last_error = ? WHERE id = ?")
            .bind(SyncSourceStatus::Error.as_str())
            .bind(message)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Return a source to the active state after a successful reconnection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_active(&self, id: SyncSourceId) -> Result<()> {
        info!(%id, "Sync source reconnected");
        sqlx::query("UPDATE sync_sources SET status = ?, last_error = NULL WHERE id = ?")
            .bind(SyncSourceStatus::Active.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Advance the checkpoint. Never moves it backwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn advance_checkpoint(&self, id: SyncSourceId, uid: u32) -> Result<()> {
        sqlx::query(
            r"
            UPDATE sync_sources
            SET last_processed_uid = MAX(COALESCE(last_processed_uid, 0), ?)
            WHERE id = ?
            ",
        )
        .bind(uid)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the end of a completed cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn touch_synced(&self, id: SyncSourceId) -> Result<()> {
        sqlx::query("UPDATE sync_sources SET last_synced_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-delete: remove from enumeration, keep history.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn deactivate(&self, id: SyncSourceId) -> Result<()> {
        sqlx::query("UPDATE sync_sources SET is_active = 0 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hard-delete a source. Its ledger and dead-letter rows are removed with
    /// it; derived records keep their data but lose the link.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: SyncSourceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_sources WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_source(row: &SqliteRow) -> Result<SyncSource> {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let last_synced_at: Option<String> = row.get("last_synced_at");

    Ok(SyncSource {
        id: SyncSourceId(row.get("id")),
        user_id: UserId(row.get("user_id")),
        account_id: AccountId(row.get("account_id")),
        bank: Bank::parse(row.get::<&str, _>("bank"))?,
        account_type: AccountType::parse(row.get::<&str, _>("account_type"))?,
        email_address: row.get("email_address"),
        imap_credentials: row.get("imap_credentials"),
        status: SyncSourceStatus::parse(&status),
        last_error: row.get("last_error"),
        last_processed_uid: row.get("last_processed_uid"),
        last_synced_at: parse_optional_timestamp(last_synced_at.as_deref())?,
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&created_at)?,
    })
}
