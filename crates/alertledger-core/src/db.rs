//! Database connection and schema.
//!
//! All repositories share one pool so that an idempotency-ledger entry and the
//! record derived from the same message can be written in one transaction.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::{Error, Result};
use crate::dlq::DlqRepository;
use crate::ledger::ProcessedEmailRepository;
use crate::records::{BalanceUpdateRepository, TransactionRepository};
use crate::sync_source::SyncSourceRepository;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS sync_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        bank TEXT NOT NULL,
        account_type TEXT NOT NULL,
        email_address TEXT NOT NULL,
        imap_credentials BLOB,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'error')),
        last_error TEXT,
        last_processed_uid INTEGER,
        last_synced_at TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_sync_sources_user_active
    ON sync_sources(user_id, is_active)
    ",
    r"
    CREATE TABLE IF NOT EXISTS processed_emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sync_source_id INTEGER NOT NULL REFERENCES sync_sources(id) ON DELETE CASCADE,
        message_uid INTEGER NOT NULL,
        content_hash TEXT,
        processed_at TEXT NOT NULL,
        UNIQUE(sync_source_id, message_uid)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        sync_source_id INTEGER REFERENCES sync_sources(id) ON DELETE SET NULL,
        processed_email_id INTEGER REFERENCES processed_emails(id) ON DELETE SET NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        merchant TEXT NOT NULL,
        card_last4 TEXT NOT NULL,
        pending INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_transactions_account_date
    ON transactions(account_id, date DESC, id DESC)
    ",
    r"
    CREATE TABLE IF NOT EXISTS balance_updates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        sync_source_id INTEGER REFERENCES sync_sources(id) ON DELETE SET NULL,
        processed_email_id INTEGER REFERENCES processed_emails(id) ON DELETE SET NULL,
        balance_type TEXT NOT NULL CHECK (balance_type IN ('available_balance', 'current_balance')),
        new_balance TEXT NOT NULL,
        update_date TEXT NOT NULL,
        update_source TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    ",
    // Serves latest-by-type lookups without scanning history.
    r"
    CREATE INDEX IF NOT EXISTS idx_balance_updates_latest
    ON balance_updates(account_id, balance_type, update_date DESC, id DESC)
    ",
    r"
    CREATE TABLE IF NOT EXISTS email_alert_dlq (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        sync_source_id INTEGER NOT NULL REFERENCES sync_sources(id) ON DELETE CASCADE,
        message_uid INTEGER NOT NULL,
        error_type TEXT NOT NULL CHECK (error_type IN
            ('NO_PARSER', 'PARSE_ERROR', 'VALIDATION_ERROR', 'NO_ACCOUNT', 'UNSUPPORTED_TYPE')),
        subject TEXT NOT NULL,
        from_address TEXT NOT NULL,
        message_date TEXT NOT NULL,
        body_text TEXT NOT NULL,
        body_html TEXT,
        error_message TEXT NOT NULL,
        error_stack TEXT,
        content_hash TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(sync_source_id, message_uid)
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_email_alert_dlq_user
    ON email_alert_dlq(user_id, created_at DESC)
    ",
];

/// Handle to the ledger database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at the given path.
    ///
    /// Creates the tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        debug!(path = database_path, "Opened ledger database");
        Ok(db)
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// The shared connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Sync source repository.
    #[must_use]
    pub fn sync_sources(&self) -> SyncSourceRepository {
        SyncSourceRepository::new(self.pool.clone())
    }

    /// Idempotency ledger repository.
    #[must_use]
    pub fn processed_emails(&self) -> ProcessedEmailRepository {
        ProcessedEmailRepository::new(self.pool.clone())
    }

    /// Transaction repository.
    #[must_use]
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    /// Balance update repository.
    #[must_use]
    pub fn balance_updates(&self) -> BalanceUpdateRepository {
        BalanceUpdateRepository::new(self.pool.clone())
    }

    /// Dead-letter queue repository.
    #[must_use]
    pub fn dead_letters(&self) -> DlqRepository {
        DlqRepository::new(self.pool.clone())
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("timestamp {s:?}: {e}")))
}

pub(crate) fn parse_optional_timestamp(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_timestamp).transpose()
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::InvalidData(format!("date {s:?}: {e}")))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| Error::InvalidData(format!("amount {s:?}: {e}")))
}
