//! Idempotency ledger models.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::{EmailMessage, SyncSourceId};

/// Identity of a message within the system: one mailbox, one UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKey {
    /// Mailbox the message came from.
    pub sync_source_id: SyncSourceId,
    /// IMAP UID within that mailbox.
    pub message_uid: u32,
}

impl MessageKey {
    /// Create a key.
    #[must_use]
    pub const fn new(sync_source_id: SyncSourceId, message_uid: u32) -> Self {
        Self {
            sync_source_id,
            message_uid,
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.sync_source_id, self.message_uid)
    }
}

/// A ledger entry. Written once per handled message and never updated.
#[derive(Debug, Clone)]
pub struct ProcessedEmail {
    /// Row identifier, referenced by derived records.
    pub id: i64,
    /// Message identity.
    pub key: MessageKey,
    /// Hash of the message content at processing time.
    pub content_hash: Option<String>,
    /// When the entry was written.
    pub processed_at: DateTime<Utc>,
}

/// Result of trying to claim a message in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// New entry written; the caller owns the message.
    Claimed(i64),
    /// An entry with the same content (or no recorded hash) already exists.
    AlreadyProcessed,
    /// An entry exists for this UID but the content differs, e.g. after the
    /// mailbox recycled UIDs.
    ContentMismatch {
        /// Hash recorded with the existing entry.
        stored: String,
        /// Hash of the message being processed.
        incoming: String,
    },
    /// The message is already in the dead-letter queue with the same content.
    Quarantined,
}

/// Compare a stored hash with the incoming one.
#[must_use]
pub fn compare_hashes(stored: Option<String>, incoming: Option<&str>) -> ClaimOutcome {
    match (stored, incoming) {
        (Some(stored), Some(incoming)) if stored != incoming => ClaimOutcome::ContentMismatch {
            stored,
            incoming: incoming.to_string(),
        },
        _ => ClaimOutcome::AlreadyProcessed,
    }
}

/// SHA-256 over the parts of a message that determine its parse result.
#[must_use]
pub fn content_hash(email: &EmailMessage) -> String {
    let mut hasher = Sha256::new();
    for part in [
        email.subject.as_str(),
        email.from_address.as_str(),
        email.body_text.as_str(),
        email.body_html.as_deref().unwrap_or_default(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
