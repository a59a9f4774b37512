//! Mail collaborator boundary.
//!
//! The IMAP session, credentials and message extraction live outside this
//! crate. The pipeline only sees normalized [`EmailMessage`] values and a
//! coarse classification of infrastructure failures.

use std::future::Future;

use crate::EmailMessage;
use crate::sync_source::SyncSource;

/// Infrastructure failures reported by a [`MailFetcher`].
///
/// Both variants move the sync source to the error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The mailbox could not be reached.
    #[error("Network error: {0}")]
    Network(String),
}

/// Source of alert emails for a sync source.
pub trait MailFetcher: Send + Sync {
    /// Messages with a UID above `since_uid` (all messages when `None`).
    ///
    /// Order and duplicates are not guaranteed; the pipeline sorts and
    /// deduplicates by UID.
    fn fetch_since(
        &self,
        source: &SyncSource,
        since_uid: Option<u32>,
    ) -> impl Future<Output = Result<Vec<EmailMessage>, FetchError>> + Send;

    /// Verify that the mailbox is reachable with the stored credentials.
    fn check_connection(
        &self,
        source: &SyncSource,
    ) -> impl Future<Output = Result<(), FetchError>> + Send;
}
