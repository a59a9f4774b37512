//! The parser contract.

use crate::email::EmailMessage;
use crate::model::{Capabilities, ParseResult};

/// A pure converter from one family of bank alert emails to a typed result.
///
/// Implementations must not perform I/O or keep mutable state. How fields are
/// extracted (patterns, structured markup, a model) is up to the implementation.
pub trait AlertParser: Send + Sync {
    /// Stable name used in logs and dead-letter records.
    fn name(&self) -> &'static str;

    /// Bank, account type and alert kind this parser handles.
    fn capabilities(&self) -> Capabilities;

    /// Whether this parser claims the email.
    fn can_parse(&self, email: &EmailMessage) -> bool;

    /// Extract the typed result.
    ///
    /// Returns `None` when the email was claimed but its structure did not
    /// match what the parser expects.
    fn parse(&self, email: &EmailMessage) -> Option<ParseResult>;
}

/// Whether the email was sent by `address`, directly or as a forwarded message.
///
/// Forwarded alerts carry the original sender in the body's forwarding header,
/// so the raw text body is searched as well.
#[must_use]
pub fn sent_by(email: &EmailMessage, address: &str) -> bool {
    let address = address.to_lowercase();
    email.from_address.to_lowercase().contains(&address)
        || email.body_text.to_lowercase().contains(&address)
        || email
            .body_html
            .as_deref()
            .is_some_and(|html| html.to_lowercase().contains(&address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{SyncSourceId, UserId};
    use chrono::Utc;

    #[test]
    fn test_sent_by_matches_direct_and_forwarded() {
        let direct = EmailMessage::new(
            UserId(1),
            SyncSourceId(1),
            1,
            "Chase <No.Reply.Alerts@Chase.com>",
            "Alert",
            "body",
            Utc::now(),
        );
        assert!(sent_by(&direct, "no.reply.alerts@chase.com"));

        let forwarded = EmailMessage::new(
            UserId(1),
            SyncSourceId(1),
            2,
            "me@example.com",
            "Fwd: Alert",
            "---------- Forwarded message ---------\nFrom: Chase <no.reply.alerts@chase.com>",
            Utc::now(),
        );
        assert!(sent_by(&forwarded, "no.reply.alerts@chase.com"));
        assert!(!sent_by(&forwarded, "alerts@notify.wellsfargo.com"));
    }
}
