//! JSON spool standing in for the mailbox.
//!
//! A spool is a JSON array of extracted alert messages, as produced by an
//! external IMAP extractor. Each cycle reads the file again and hands over the
//! messages of the requested source above its checkpoint.

use std::path::{Path, PathBuf};

use alertledger_core::{EmailMessage, FetchError, MailFetcher, SyncSource};

/// Mail fetcher reading a JSON spool file.
#[derive(Debug, Clone)]
pub struct JsonSpool {
    path: PathBuf,
}

impl JsonSpool {
    /// Use the spool at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the spool file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<EmailMessage>, FetchError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::Network(format!("{}: {e}", self.path.display())))?;

        serde_json::from_str(&contents)
            .map_err(|e| FetchError::Network(format!("{}: malformed spool: {e}", self.path.display())))
    }
}

impl MailFetcher for JsonSpool {
    async fn fetch_since(
        &self,
        source: &SyncSource,
        since_uid: Option<u32>,
    ) -> Result<Vec<EmailMessage>, FetchError> {
        let messages = self.read().await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.sync_source_id == source.id && m.user_id == source.user_id)
            .filter(|m| since_uid.is_none_or(|uid| m.message_uid > uid))
            .collect())
    }

    async fn check_connection(&self, _source: &SyncSource) -> Result<(), FetchError> {
        self.read().await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alertledger_core::{AccountId, AccountType, Bank, SyncSourceId, SyncSourceStatus, UserId};
    use chrono::Utc;

    fn source(id: i64) -> SyncSource {
        SyncSource {
            id: SyncSourceId(id),
            user_id: UserId(1),
            account_id: AccountId(1),
            bank: Bank::Chase,
            account_type: AccountType::CreditCard,
            email_address: "me@example.com".to_string(),
            imap_credentials: None,
            status: SyncSourceStatus::Active,
            last_error: None,
            last_processed_uid: None,
            last_synced_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn message(source: i64, uid: u32) -> EmailMessage {
        EmailMessage::new(
            UserId(1),
            SyncSourceId(source),
            uid,
            "alerts@example.com",
            "Alert",
            "body",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_fetch_filters_by_source_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool.json");
        let messages = vec![message(1, 1), message(1, 2), message(2, 3), message(1, 4)];
        tokio::fs::write(&path, serde_json::to_string(&messages).unwrap())
            .await
            .unwrap();
        let spool = JsonSpool::new(&path);

        let fetched = spool.fetch_since(&source(1), Some(1)).await.unwrap();

        let uids: Vec<_> = fetched.iter().map(|m| m.message_uid).collect();
        assert_eq!(uids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_missing_spool_is_a_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spool = JsonSpool::new(dir.path().join("absent.json"));

        assert!(matches!(
            spool.check_connection(&source(1)).await,
            Err(FetchError::Network(_))
        ));
    }
}
