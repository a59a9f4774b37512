//! Capital One credit card purchase notifications.

use std::sync::LazyLock;

use regex::Regex;

use crate::email::EmailMessage;
use crate::model::{
    AccountType, AlertKind, Bank, Capabilities, ParseResult, ParsedTransaction,
};
use crate::parser::{AlertParser, sent_by};
use crate::text::{compile, extract_email_body, parse_amount, parse_long_date};

const SENDER: &str = "capitalone@notification.capitalone.com";

static PURCHASE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)on ([a-z]+ \d{1,2}, \d{4}), at (.+?), a pending authorization or purchase in the amount of \$([\d,]+\.\d{2}) was placed or charged on your .*?ending in (\d{4})",
    )
});

/// Purchase notifications. Capital One sends them at authorization time, so
/// the resulting transaction is pending.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapitalOneTransactionParser;

impl AlertParser for CapitalOneTransactionParser {
    fn name(&self) -> &'static str {
        "capital_one_credit_transaction"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::CapitalOne, AccountType::CreditCard, AlertKind::Transaction)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER)
            && extract_email_body(email)
                .to_lowercase()
                .contains("pending authorization or purchase")
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        let body = extract_email_body(email);
        let caps = PURCHASE.captures(&body)?;

        Some(ParseResult::Transaction(ParsedTransaction {
            date: parse_long_date(&caps[1])?,
            amount: -parse_amount(&caps[3])?.abs(),
            merchant: caps[2].trim().to_string(),
            card_last4: caps[4].to_string(),
            pending: true,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::email::{SyncSourceId, UserId};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    #[test]
    fn test_purchase_notification() {
        let email = EmailMessage::new(
            UserId(1),
            SyncSourceId(3),
            30,
            "Capital One <capitalone@notification.capitalone.com>",
            "A new transaction was charged to your account",
            "As requested, we're notifying you that on January 05, 2026, at STARBUCKS STORE 123, \
             a pending authorization or purchase in the amount of $5.25 was placed or charged \
             on your Capital One SavorOne Credit Card ending in 4321.",
            Utc::now(),
        );
        let parser = CapitalOneTransactionParser;

        assert!(parser.can_parse(&email));
        assert_eq!(
            parser.parse(&email),
            Some(ParseResult::Transaction(ParsedTransaction {
                date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                amount: Decimal::new(-525, 2),
                merchant: "STARBUCKS STORE 123".to_string(),
                card_last4: "4321".to_string(),
                pending: true,
            }))
        );
    }
}
