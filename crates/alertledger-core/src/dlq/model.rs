//! Dead-letter models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::{MessageKey, content_hash};
use crate::{DispatchFailure, EmailMessage, FailureKind, SyncSourceId, UserId};

/// A message the pipeline could not convert, kept for manual triage.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    /// Row identifier.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Mailbox the message came from.
    pub sync_source_id: SyncSourceId,
    /// IMAP UID.
    pub message_uid: u32,
    /// Failure classification.
    #[serde(serialize_with = "serialize_failure_kind")]
    pub error_type: FailureKind,
    /// Subject snapshot.
    pub subject: String,
    /// Sender snapshot.
    pub from_address: String,
    /// Date the message was sent.
    pub message_date: DateTime<Utc>,
    /// Plain-text body snapshot.
    pub body_text: String,
    /// HTML body snapshot.
    pub body_html: Option<String>,
    /// Human-readable failure.
    pub error_message: String,
    /// Failure trail.
    pub error_stack: Option<String>,
    /// Hash of the message content when it was quarantined.
    pub content_hash: Option<String>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

fn serialize_failure_kind<S>(kind: &FailureKind, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(kind.as_str())
}

impl DeadLetter {
    /// Identity of the quarantined message.
    #[must_use]
    pub const fn key(&self) -> MessageKey {
        MessageKey::new(self.sync_source_id, self.message_uid)
    }

    /// Rebuild the message from its snapshot for a replay.
    #[must_use]
    pub fn to_email(&self) -> EmailMessage {
        EmailMessage {
            message_uid: self.message_uid,
            subject: self.subject.clone(),
            from_address: self.from_address.clone(),
            date: self.message_date,
            body_text: self.body_text.clone(),
            body_html: self.body_html.clone(),
            alert_type: None,
            user_id: self.user_id,
            sync_source_id: self.sync_source_id,
            created_at: Utc::now(),
        }
    }
}

/// Fields for a new dead-letter entry.
#[derive(Debug, Clone)]
pub struct NewDeadLetter {
    /// Owner.
    pub user_id: UserId,
    /// Message identity.
    pub key: MessageKey,
    /// Failure classification.
    pub error_type: FailureKind,
    /// Subject snapshot.
    pub subject: String,
    /// Sender snapshot.
    pub from_address: String,
    /// Date the message was sent.
    pub message_date: DateTime<Utc>,
    /// Plain-text body snapshot.
    pub body_text: String,
    /// HTML body snapshot.
    pub body_html: Option<String>,
    /// Human-readable failure.
    pub error_message: String,
    /// Failure trail.
    pub error_stack: Option<String>,
    /// Hash of the message content.
    pub content_hash: String,
}

impl NewDeadLetter {
    /// Snapshot a message together with the reason it failed.
    #[must_use]
    pub fn from_failure(
        user_id: UserId,
        key: MessageKey,
        email: &EmailMessage,
        failure: &DispatchFailure,
    ) -> Self {
        Self {
            user_id,
            key,
            error_type: failure.kind,
            subject: email.subject.clone(),
            from_address: email.from_address.clone(),
            message_date: email.date,
            body_text: email.body_text.clone(),
            body_html: email.body_html.clone(),
            error_message: failure.message.clone(),
            error_stack: Some(failure.trail()),
            content_hash: content_hash(email),
        }
    }
}

/// Result of trying to quarantine a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// New entry written.
    Recorded(i64),
    /// The message already has a dead-letter entry with the same content.
    AlreadyQuarantined,
    /// The message already has a ledger entry with the same content; the
    /// caller must roll back.
    AlreadyProcessed,
    /// The UID is already in the ledger or the dead-letter queue with
    /// different content; the caller must roll back.
    ContentMismatch {
        /// Hash recorded with the existing entry.
        stored: String,
        /// Hash of the message being quarantined.
        incoming: String,
    },
}
