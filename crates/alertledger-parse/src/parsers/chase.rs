//! Chase credit card alerts.
//!
//! All three alert families come from the same sender, so the claim checks
//! look at the subject and body wording. Register payment and balance parsers
//! ahead of the transaction parser; its claim is the broadest. The payment
//! claim matches confirmation phrasing, never a bare keyword, so purchases at
//! merchants named like "VENMO PAYMENT" still reach the transaction parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::email::EmailMessage;
use crate::model::{
    AccountType, AlertKind, Bank, Capabilities, ParseResult, ParsedCreditUpdate, ParsedPayment,
    ParsedTransaction,
};
use crate::parser::{AlertParser, sent_by};
use crate::text::{compile, extract_email_body, parse_amount, parse_slash_date};

const SENDER: &str = "no.reply.alerts@chase.com";

static TRANSACTION: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\$([\d,]+\.\d{2}) (?:transaction )?(?:at|with) (.+?) (?:was|has been|is) (approved|pending)\b.*?ending in (\d{4})",
    )
});

static TRANSACTION_CLAIM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(?:was|has been|is) (?:approved|pending)\b"));

static PAYMENT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)payment of \$([\d,]+\.\d{2}).*?ending in (\d{4})"));

static PAYMENT_CLAIM: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bpayment of \$|\bpayment (?:was |has been )?received\b|\breceived your payment\b")
});

static POSTED_ON: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:posted|received|made) on (\d{1,2}/\d{1,2}/\d{4})"));

static AVAILABLE_CREDIT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)available credit(?: is| of|:)?(?: now)?:? \$([\d,]+\.\d{2})")
});

static ENDING_IN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)ending in (\d{4})"));

fn mentions(email: &EmailMessage, needle: &str) -> bool {
    email.subject.to_lowercase().contains(needle)
        || extract_email_body(email).to_lowercase().contains(needle)
}

/// Card purchase alerts: "$12.34 at MERCHANT was approved ... ending in 5678".
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaseCreditTransactionParser;

impl AlertParser for ChaseCreditTransactionParser {
    fn name(&self) -> &'static str {
        "chase_credit_transaction"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::Chase, AccountType::CreditCard, AlertKind::Transaction)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER)
            && (email.subject.to_lowercase().contains("transaction")
                || TRANSACTION_CLAIM.is_match(&extract_email_body(email)))
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        let body = extract_email_body(email);
        let caps = TRANSACTION.captures(&body)?;

        let amount = parse_amount(&caps[1])?;
        Some(ParseResult::Transaction(ParsedTransaction {
            date: email.date.date_naive(),
            amount: -amount.abs(),
            merchant: caps[2].trim().to_string(),
            card_last4: caps[4].to_string(),
            pending: caps[3].eq_ignore_ascii_case("pending"),
        }))
    }
}

/// Available credit notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaseCreditBalanceParser;

impl AlertParser for ChaseCreditBalanceParser {
    fn name(&self) -> &'static str {
        "chase_credit_balance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::Chase, AccountType::CreditCard, AlertKind::Balance)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER) && mentions(email, "available credit")
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        let body = extract_email_body(email);
        let amount = AVAILABLE_CREDIT.captures(&body)?;
        let last4 = ENDING_IN.captures(&body)?;

        Some(ParseResult::CreditUpdate(ParsedCreditUpdate {
            available_credit: parse_amount(&amount[1])?,
            card_last4: last4[1].to_string(),
        }))
    }
}

/// Payment confirmations. The posting date falls back to the email date.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaseCreditPaymentParser;

impl AlertParser for ChaseCreditPaymentParser {
    fn name(&self) -> &'static str {
        "chase_credit_payment"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::Chase, AccountType::CreditCard, AlertKind::Payment)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER)
            && (PAYMENT_CLAIM.is_match(&email.subject)
                || PAYMENT_CLAIM.is_match(&extract_email_body(email)))
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        let body = extract_email_body(email);
        let caps = PAYMENT.captures(&body)?;

        let date = match POSTED_ON.captures(&body) {
            Some(posted) => parse_slash_date(&posted[1])?,
            None => email.date.date_naive(),
        };

        Some(ParseResult::Payment(ParsedPayment {
            amount: parse_amount(&caps[1])?.abs(),
            date,
            card_last4: caps[2].to_string(),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::email::{SyncSourceId, UserId};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn chase(subject: &str, body: &str) -> EmailMessage {
        EmailMessage::new(
            UserId(1),
            SyncSourceId(1),
            10,
            "Chase <no.reply.alerts@chase.com>",
            subject,
            body,
            Utc.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_approved_transaction_is_an_outflow() {
        let email = chase(
            "Your $12.34 transaction with STRIPE-Z.AI",
            "[image: Chase]\nYour $12.34 at STRIPE-Z.AI was approved\non your credit card ending in 5678.",
        );
        let parser = ChaseCreditTransactionParser;

        assert!(parser.can_parse(&email));
        let Some(ParseResult::Transaction(txn)) = parser.parse(&email) else {
            panic!("expected a transaction");
        };
        assert_eq!(txn.amount, Decimal::new(-1234, 2));
        assert_eq!(txn.merchant, "STRIPE-Z.AI");
        assert_eq!(txn.card_last4, "5678");
        assert!(!txn.pending);
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
    }

    #[test]
    fn test_pending_transaction() {
        let email = chase(
            "Transaction alert",
            "A $1,050.00 transaction at DELTA AIR LINES is pending on your card ending in 0042.",
        );
        let Some(ParseResult::Transaction(txn)) = ChaseCreditTransactionParser.parse(&email)
        else {
            panic!("expected a transaction");
        };
        assert_eq!(txn.amount, Decimal::new(-105_000, 2));
        assert!(txn.pending);
    }

    #[test]
    fn test_claimed_but_malformed_transaction() {
        let email = chase("Your transaction alert", "Something happened on your account.");
        assert!(ChaseCreditTransactionParser.can_parse(&email));
        assert!(ChaseCreditTransactionParser.parse(&email).is_none());
    }

    #[test]
    fn test_available_credit() {
        let email = chase(
            "Your available credit",
            "Your available credit is now $4,321.09 on your card ending in 5678.",
        );
        let parser = ChaseCreditBalanceParser;
        assert!(parser.can_parse(&email));
        assert_eq!(
            parser.parse(&email),
            Some(ParseResult::CreditUpdate(ParsedCreditUpdate {
                available_credit: Decimal::new(432_109, 2),
                card_last4: "5678".to_string(),
            }))
        );
    }

    #[test]
    fn test_payment_is_an_inflow() {
        let email = chase(
            "We received your payment",
            "We've received your payment of $500.00 for your card ending in 5678. It posted on 01/15/2026.",
        );
        let parser = ChaseCreditPaymentParser;
        assert!(parser.can_parse(&email));
        assert_eq!(
            parser.parse(&email),
            Some(ParseResult::Payment(ParsedPayment {
                amount: Decimal::new(50_000, 2),
                date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
                card_last4: "5678".to_string(),
            }))
        );
    }

    #[test]
    fn test_payment_merchant_purchase_is_not_a_payment() {
        let email = chase(
            "Your $12.34 transaction with VENMO PAYMENT",
            "Your $12.34 at VENMO PAYMENT was approved on your credit card ending in 5678.",
        );
        assert!(!ChaseCreditPaymentParser.can_parse(&email));
        assert!(ChaseCreditTransactionParser.can_parse(&email));
    }

    #[test]
    fn test_html_only_alert_is_claimed() {
        let email = chase("Account alert", "").with_html(
            "<p>Your available credit is now <b>$900.00</b> on your card ending in 5678.</p>",
        );
        assert!(ChaseCreditBalanceParser.can_parse(&email));
        assert!(!ChaseCreditPaymentParser.can_parse(&email));
    }

    #[test]
    fn test_other_senders_are_not_claimed() {
        let mut email = chase(
            "Your transaction",
            "Your $12.34 at SHOP was approved on card ending in 5678.",
        );
        email.from_address = "alerts@example.com".to_string();
        assert!(!ChaseCreditTransactionParser.can_parse(&email));
    }
}
