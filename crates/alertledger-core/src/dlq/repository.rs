//! Dead-letter queue repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};

use super::model::{DeadLetter, NewDeadLetter, QuarantineOutcome};
use crate::db::parse_timestamp;
use crate::ledger::{ClaimOutcome, MessageKey, compare_hashes};
use crate::{FailureKind, Result, SyncSourceId, UserId};

const COLUMNS: &str = "id, user_id, sync_source_id, message_uid, error_type, subject, \
                       from_address, message_date, body_text, body_html, error_message, \
                       error_stack, content_hash, created_at";

/// Repository for quarantined messages.
///
/// Entries are only ever added by the pipeline and only ever removed by an
/// explicit operator action.
#[derive(Debug, Clone)]
pub struct DlqRepository {
    pool: SqlitePool,
}

impl DlqRepository {
    /// Create a repository on a shared pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Quarantine a message inside the caller's transaction.
    ///
    /// An existing ledger or dead-letter entry for the same UID is compared
    /// by content hash, so a recycled UID surfaces as
    /// [`QuarantineOutcome::ContentMismatch`]. On any outcome other than
    /// [`QuarantineOutcome::Recorded`] the caller must roll back.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn quarantine_in(
        conn: &mut SqliteConnection,
        entry: &NewDeadLetter,
    ) -> Result<QuarantineOutcome> {
        let result = sqlx::query(
            r"
            INSERT INTO email_alert_dlq
                (user_id, sync_source_id, message_uid, error_type, subject, from_address,
                 message_date, body_text, body_html, error_message, error_stack, content_hash,
                 created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(sync_source_id, message_uid) DO NOTHING
            ",
        )
        .bind(entry.user_id.0)
        .bind(entry.key.sync_source_id.0)
        .bind(entry.key.message_uid)
        .bind(entry.error_type.as_str())
        .bind(&entry.subject)
        .bind(&entry.from_address)
        .bind(entry.message_date.to_rfc3339())
        .bind(&entry.body_text)
        .bind(entry.body_html.as_deref())
        .bind(&entry.error_message)
        .bind(entry.error_stack.as_deref())
        .bind(&entry.content_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let stored: Option<String> = sqlx::query_scalar(
                "SELECT content_hash FROM email_alert_dlq WHERE sync_source_id = ? AND message_uid = ?",
            )
            .bind(entry.key.sync_source_id.0)
            .bind(entry.key.message_uid)
            .fetch_one(&mut *conn)
            .await?;
            return Ok(match compare_hashes(stored, Some(&entry.content_hash)) {
                ClaimOutcome::ContentMismatch { stored, incoming } => {
                    QuarantineOutcome::ContentMismatch { stored, incoming }
                }
                _ => QuarantineOutcome::AlreadyQuarantined,
            });
        }
        let id = result.last_insert_rowid();

        let processed: Option<Option<String>> = sqlx::query_scalar(
            "SELECT content_hash FROM processed_emails WHERE sync_source_id = ? AND message_uid = ?",
        )
        .bind(entry.key.sync_source_id.0)
        .bind(entry.key.message_uid)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(match processed {
            None => QuarantineOutcome::Recorded(id),
            Some(stored) => match compare_hashes(stored, Some(&entry.content_hash)) {
                ClaimOutcome::ContentMismatch { stored, incoming } => {
                    QuarantineOutcome::ContentMismatch { stored, incoming }
                }
                _ => QuarantineOutcome::AlreadyProcessed,
            },
        })
    }

    /// Whether a message is quarantined.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, key: MessageKey) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM email_alert_dlq WHERE sync_source_id = ? AND message_uid = ?",
        )
        .bind(key.sync_source_id.0)
        .bind(key.message_uid)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// A user's entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_user(&self, user_id: UserId, limit: u32) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM email_alert_dlq WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_dead_letter).collect()
    }

    /// One entry, if it belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_for_user(&self, user_id: UserId, id: i64) -> Result<Option<DeadLetter>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM email_alert_dlq WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_dead_letter).transpose()
    }

    /// Delete an entry owned by the user. Returns whether a row was removed.
    ///
    /// The message becomes eligible for processing again.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_for_user(&self, user_id: UserId, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_alert_dlq WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an entry inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_in(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_alert_dlq WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Entries recorded for a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_source(&self, id: SyncSourceId) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM email_alert_dlq WHERE sync_source_id = ?")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_dead_letter(row: &SqliteRow) -> Result<DeadLetter> {
    Ok(DeadLetter {
        id: row.get("id"),
        user_id: UserId(row.get("user_id")),
        sync_source_id: SyncSourceId(row.get("sync_source_id")),
        message_uid: row.get("message_uid"),
        error_type: FailureKind::parse(row.get("error_type"))?,
        subject: row.get("subject"),
        from_address: row.get("from_address"),
        message_date: parse_timestamp(row.get("message_date"))?,
        body_text: row.get("body_text"),
        body_html: row.get("body_html"),
        error_message: row.get("error_message"),
        error_stack: row.get("error_stack"),
        content_hash: row.get("content_hash"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sync_source::NewSyncSource;
    use crate::{AccountId, AccountType, Bank, Database, DispatchFailure, EmailMessage};

    async fn setup() -> (Database, MessageKey, EmailMessage) {
        let db = Database::in_memory().await.unwrap();
        let source = db
            .sync_sources()
            .create(&NewSyncSource::new(
                UserId(1),
                AccountId(1),
                Bank::Chase,
                AccountType::CreditCard,
                "me@example.com",
            ))
            .await
            .unwrap();
        let email = EmailMessage::new(
            UserId(1),
            source.id,
            9,
            "news@shop.example",
            "Sale",
            "50% off",
            Utc::now(),
        )
        .with_html("<p>50% off</p>");
        (db, MessageKey::new(source.id, 9), email)
    }

    fn failure() -> DispatchFailure {
        DispatchFailure {
            kind: FailureKind::NoParser,
            parser: None,
            message: "no parser matched".to_string(),
        }
    }

    async fn quarantine(db: &Database, entry: &NewDeadLetter) -> QuarantineOutcome {
        let mut tx = db.pool().begin().await.unwrap();
        let outcome = DlqRepository::quarantine_in(&mut tx, entry).await.unwrap();
        tx.commit().await.unwrap();
        outcome
    }

    #[tokio::test]
    async fn test_quarantine_snapshots_the_message() {
        let (db, key, email) = setup().await;
        let entry = NewDeadLetter::from_failure(UserId(1), key, &email, &failure());

        assert!(matches!(quarantine(&db, &entry).await, QuarantineOutcome::Recorded(_)));

        let entries = db.dead_letters().list_for_user(UserId(1), 50).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].error_type, FailureKind::NoParser);
        assert_eq!(entries[0].subject, "Sale");
        assert_eq!(entries[0].body_html.as_deref(), Some("<p>50% off</p>"));
        assert!(entries[0].error_stack.as_deref().unwrap().contains("NO_PARSER"));
        assert_eq!(entries[0].to_email().body_text, "50% off");
    }

    #[tokio::test]
    async fn test_second_quarantine_is_not_duplicated() {
        let (db, key, email) = setup().await;
        let entry = NewDeadLetter::from_failure(UserId(1), key, &email, &failure());

        quarantine(&db, &entry).await;
        assert_eq!(
            quarantine(&db, &entry).await,
            QuarantineOutcome::AlreadyQuarantined
        );
        assert_eq!(db.dead_letters().count_for_source(key.sync_source_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recycled_uid_in_queue_is_a_mismatch() {
        let (db, key, email) = setup().await;
        let entry = NewDeadLetter::from_failure(UserId(1), key, &email, &failure());
        quarantine(&db, &entry).await;

        let recycled = EmailMessage {
            body_text: "A different message".to_string(),
            ..email
        };
        let entry = NewDeadLetter::from_failure(UserId(1), key, &recycled, &failure());

        let outcome = quarantine(&db, &entry).await;
        assert!(matches!(outcome, QuarantineOutcome::ContentMismatch { .. }));
        let stored = db.dead_letters().list_for_user(UserId(1), 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body_text, "50% off");
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_owner() {
        let (db, key, email) = setup().await;
        let entry = NewDeadLetter::from_failure(UserId(1), key, &email, &failure());
        let QuarantineOutcome::Recorded(id) = quarantine(&db, &entry).await else {
            panic!("expected a new entry");
        };
        let repo = db.dead_letters();

        assert!(repo.get_for_user(UserId(2), id).await.unwrap().is_none());
        assert!(!repo.delete_for_user(UserId(2), id).await.unwrap());
        assert!(repo.exists(key).await.unwrap());

        assert!(repo.delete_for_user(UserId(1), id).await.unwrap());
        assert!(!repo.exists(key).await.unwrap());
    }
}
