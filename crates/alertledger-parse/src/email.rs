//! Normalized alert email handed over by the mail collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::AlertKind;

/// Identifier of the user owning a sync source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Identifier of a monitored mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncSourceId(pub i64);

/// Identifier of a financial account in the user's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

macro_rules! id_display {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Create a new identifier.
                #[must_use]
                pub const fn new(id: i64) -> Self {
                    Self(id)
                }
            }

            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_display!(UserId, SyncSourceId, AccountId);

/// An alert email as extracted from the monitored mailbox.
///
/// The core never persists this value directly; it only snapshots it into the
/// dead-letter queue when the message cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// IMAP UID of the message within the monitored mailbox.
    pub message_uid: u32,
    /// Subject header.
    pub subject: String,
    /// Sender address (may include a display name).
    pub from_address: String,
    /// Date the message was sent.
    pub date: DateTime<Utc>,
    /// Plain-text body.
    #[serde(default)]
    pub body_text: String,
    /// HTML body, when the message had one.
    #[serde(default)]
    pub body_html: Option<String>,
    /// Alert kind hinted by the upstream collaborator, if any.
    #[serde(default)]
    pub alert_type: Option<AlertKind>,
    /// Owner of the mailbox.
    pub user_id: UserId,
    /// Mailbox the message came from.
    pub sync_source_id: SyncSourceId,
    /// When the collaborator extracted the message.
    pub created_at: DateTime<Utc>,
}

impl EmailMessage {
    /// Create a plain-text message with the current time as extraction time.
    #[must_use]
    pub fn new(
        user_id: UserId,
        sync_source_id: SyncSourceId,
        message_uid: u32,
        from_address: impl Into<String>,
        subject: impl Into<String>,
        body_text: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            message_uid,
            subject: subject.into(),
            from_address: from_address.into(),
            date,
            body_text: body_text.into(),
            body_html: None,
            alert_type: None,
            user_id,
            sync_source_id,
            created_at: Utc::now(),
        }
    }

    /// Attach an HTML body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_spool_record() {
        let json = r#"{
            "message_uid": 42,
            "subject": "Transaction alert",
            "from_address": "no.reply.alerts@chase.com",
            "date": "2026-01-01T12:00:00Z",
            "body_text": "hello",
            "user_id": 7,
            "sync_source_id": 3,
            "created_at": "2026-01-01T12:05:00Z"
        }"#;

        let email: EmailMessage = serde_json::from_str(json).unwrap();
        assert_eq!(email.message_uid, 42);
        assert_eq!(email.user_id, UserId(7));
        assert_eq!(email.sync_source_id, SyncSourceId(3));
        assert!(email.body_html.is_none());
        assert!(email.alert_type.is_none());
    }
}
