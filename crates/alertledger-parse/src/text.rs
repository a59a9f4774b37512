//! Shared preprocessing for alert bodies.
//!
//! Alert text arrives wrapped in forwarding headers, split across lines and
//! sprinkled with inline image references. Everything here reduces a body to a
//! single normalized line so that parser patterns can stay single-line.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::email::EmailMessage;

/// Compile a pattern literal.
#[allow(clippy::expect_used)] // patterns are literals covered by tests
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("alert pattern must compile")
}

static FORWARD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)-{2,}\s*forwarded message\s*-{2,}|begin forwarded message:|-{2,}\s*original message\s*-{2,}")
});

static IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\[(?:image:[^\]]*|(?:cid:|https?://)[^\]\s]*)\]"));

static HTML_DROP: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<(style|script|head)[^>]*>.*?</(style|script|head)>"));

static HTML_BREAK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6])>"));

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));

/// Extract the normalized alert text from an email.
///
/// Prefers the plain-text body and falls back to the tag-stripped HTML body.
/// Forwarded messages are unwrapped, inline image references removed and all
/// whitespace runs (newlines included) collapsed to single spaces.
#[must_use]
pub fn extract_email_body(email: &EmailMessage) -> String {
    if email.body_text.trim().is_empty() {
        let html = email.body_html.as_deref().unwrap_or_default();
        normalize_body(&strip_html(html))
    } else {
        normalize_body(&email.body_text)
    }
}

/// Normalize a raw body: unwrap forwarding, drop image references, collapse whitespace.
#[must_use]
pub fn normalize_body(raw: &str) -> String {
    let unwrapped = unwrap_forwarded(raw);
    let without_images = IMAGE_REF.replace_all(unwrapped, " ");
    collapse_whitespace(&without_images)
}

/// Return the original content of a forwarded message.
///
/// When a forward marker is present, the content starts after the first blank
/// line following the `To:` header of the forwarded block. Bodies without a
/// marker, or with an incomplete header block, are returned unchanged.
#[must_use]
pub fn unwrap_forwarded(raw: &str) -> &str {
    let Some(marker) = FORWARD_MARKER.find(raw) else {
        return raw;
    };

    let mut offset = marker.end();
    let mut seen_to = false;
    for line in raw[marker.end()..].split_inclusive('\n') {
        let trimmed = line.trim();
        if seen_to && trimmed.is_empty() {
            return &raw[offset + line.len()..];
        }
        if !seen_to && trimmed.get(..3).is_some_and(|h| h.eq_ignore_ascii_case("to:")) {
            seen_to = true;
        }
        offset += line.len();
    }

    raw
}

/// Collapse every whitespace run to a single space and trim the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML body to text with line breaks at block boundaries.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = HTML_DROP.replace_all(html, " ");
    let text = HTML_BREAK.replace_all(&text, "\n");
    let text = HTML_TAG.replace_all(&text, " ");
    text.replace("&nbsp;", " ")
        .replace("&#36;", "$")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Parse a money amount such as `$1,234.56`.
///
/// Currency markers and thousands separators are stripped. A leading minus or
/// surrounding parentheses make the amount negative.
#[must_use]
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let digits: String = trimmed
        .replace("USD", "")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&digits).ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a long-form date such as `January 01, 2026` (abbreviated months accepted).
#[must_use]
pub fn parse_long_date(s: &str) -> Option<NaiveDate> {
    let s = collapse_whitespace(s);
    NaiveDate::parse_from_str(&s, "%B %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(&s, "%b %d, %Y"))
        .ok()
}

/// Parse a US slash date such as `01/15/2026`.
#[must_use]
pub fn parse_slash_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y").ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::email::{SyncSourceId, UserId};
    use chrono::Utc;
    use proptest::prelude::*;

    fn email(body: &str) -> EmailMessage {
        EmailMessage::new(
            UserId(1),
            SyncSourceId(1),
            1,
            "alerts@example.com",
            "Alert",
            body,
            Utc::now(),
        )
    }

    #[test]
    fn test_forwarded_body_keeps_only_original_content() {
        let body = "FYI see below\n\n\
                    ---------- Forwarded message ---------\n\
                    From: Chase <no.reply.alerts@chase.com>\n\
                    Date: Thu, Jan 1, 2026 at 9:00 AM\n\
                    Subject: Your transaction\n\
                    To: <me@example.com>\n\
                    \n\
                    You made a $12.34 transaction\nwith STRIPE.\n";

        assert_eq!(
            extract_email_body(&email(body)),
            "You made a $12.34 transaction with STRIPE."
        );
    }

    #[test]
    fn test_forward_without_blank_line_is_left_alone() {
        let body = "Begin forwarded message:\nFrom: a@b.com\nTo: c@d.com";
        assert_eq!(unwrap_forwarded(body), body);
    }

    #[test]
    fn test_image_references_are_removed() {
        let body = "[image: Chase logo] Your card\n[https://static.chase.com/img/logo.png]  ending in 5678";
        assert_eq!(extract_email_body(&email(body)), "Your card ending in 5678");
    }

    #[test]
    fn test_html_fallback() {
        let mut message = email("   ");
        message.body_html = Some(
            "<html><head><style>p{}</style></head><body><p>Available credit:</p><p>&#36;1,000.00</p></body></html>"
                .to_string(),
        );
        assert_eq!(
            extract_email_body(&message),
            "Available credit: $1,000.00"
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56"), Some(Decimal::new(123_456, 2)));
        assert_eq!(parse_amount("USD 12.34"), Some(Decimal::new(1234, 2)));
        assert_eq!(parse_amount("-$5.00"), Some(Decimal::new(-500, 2)));
        assert_eq!(parse_amount("($5.00)"), Some(Decimal::new(-500, 2)));
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            parse_long_date("January 01, 2026"),
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );
        assert_eq!(
            parse_long_date("Feb 3, 2026"),
            NaiveDate::from_ymd_opt(2026, 2, 3)
        );
        assert_eq!(
            parse_slash_date("01/15/2026"),
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
        assert_eq!(parse_slash_date("13/45/2026"), None);
    }

    proptest! {
        #[test]
        fn collapsed_text_has_no_whitespace_runs(s in "[a-z \t\r\n]{0,64}") {
            let collapsed = collapse_whitespace(&s);
            prop_assert!(!collapsed.contains("  "));
            prop_assert!(!collapsed.contains('\n'));
            prop_assert_eq!(collapsed.trim(), collapsed.as_str());
        }

        #[test]
        fn formatted_amounts_parse_back(cents in 0i64..100_000_000) {
            let value = Decimal::new(cents, 2);
            let whole = cents / 100;
            let formatted = format!(
                "${},{:03}.{:02}",
                whole / 1000,
                whole % 1000,
                cents % 100
            );
            prop_assert_eq!(parse_amount(&formatted), Some(value));
        }
    }
}
