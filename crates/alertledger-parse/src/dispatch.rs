//! Content-based parser dispatch.

use chrono::{DateTime, Days, Utc};

use crate::email::{AccountId, EmailMessage};
use crate::model::{AccountType, AlertKind, Bank, Capabilities, FailureKind, ParseResult};
use crate::parser::AlertParser;
use crate::registry::ParserRegistry;

/// Resolves the user's active account for a bank and account type.
pub trait AccountLookup {
    /// The active account for this combination, if the user has one.
    fn resolve(&self, bank: Bank, account_type: AccountType) -> Option<AccountId>;
}

impl<F> AccountLookup for F
where
    F: Fn(Bank, AccountType) -> Option<AccountId>,
{
    fn resolve(&self, bank: Bank, account_type: AccountType) -> Option<AccountId> {
        self(bank, account_type)
    }
}

/// A successfully parsed and validated email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// Name of the parser that produced the result.
    pub parser: &'static str,
    /// What that parser declares.
    pub capabilities: Capabilities,
    /// Account the result belongs to.
    pub account_id: AccountId,
    /// The parsed value.
    pub result: ParseResult,
}

/// Why an email could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DispatchFailure {
    /// Taxonomy entry.
    pub kind: FailureKind,
    /// Parser that claimed the email, if any.
    pub parser: Option<&'static str>,
    /// Human-readable detail.
    pub message: String,
}

impl DispatchFailure {
    fn new(kind: FailureKind, parser: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            parser,
            message: message.into(),
        }
    }

    /// Multi-line trail kept with dead-letter records for triage.
    #[must_use]
    pub fn trail(&self) -> String {
        format!(
            "failure: {}\nparser: {}\ndetail: {}",
            self.kind,
            self.parser.unwrap_or("<none>"),
            self.message
        )
    }
}

/// Picks the parser for an email and turns its output into a [`Dispatched`].
///
/// Evaluation follows registration order and the first claiming parser wins;
/// later parsers are never consulted, even when the winner fails.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ParserRegistry,
    handled: Vec<AlertKind>,
}

impl Dispatcher {
    /// Create a dispatcher handling every alert kind.
    #[must_use]
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            handled: AlertKind::ALL.to_vec(),
        }
    }

    /// Restrict the alert kinds that have a handling path.
    #[must_use]
    pub fn with_handled_kinds(mut self, kinds: impl IntoIterator<Item = AlertKind>) -> Self {
        self.handled = kinds.into_iter().collect();
        self
    }

    /// The underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Alert kinds with a handling path.
    #[must_use]
    pub fn handled_kinds(&self) -> &[AlertKind] {
        &self.handled
    }

    /// The first parser claiming the email.
    #[must_use]
    pub fn select(&self, email: &EmailMessage) -> Option<&dyn AlertParser> {
        self.registry.iter().find(|parser| parser.can_parse(email))
    }

    /// Select, parse, resolve and validate.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchFailure`] classified by the closed failure taxonomy.
    pub fn dispatch(
        &self,
        email: &EmailMessage,
        accounts: &impl AccountLookup,
    ) -> Result<Dispatched, DispatchFailure> {
        let Some(parser) = self.select(email) else {
            let hint = email
                .alert_type
                .map_or(String::new(), |kind| format!(" (hinted as {})", kind.as_str()));
            return Err(DispatchFailure::new(
                FailureKind::NoParser,
                None,
                format!(
                    "no parser matched sender {:?} subject {:?}{hint}",
                    email.from_address, email.subject
                ),
            ));
        };

        let name = parser.name();
        let capabilities = parser.capabilities();

        if !self.handled.contains(&capabilities.alert_kind) {
            return Err(DispatchFailure::new(
                FailureKind::UnsupportedType,
                Some(name),
                format!(
                    "{} alerts have no handling path",
                    capabilities.alert_kind.as_str()
                ),
            ));
        }

        let Some(account_id) = accounts.resolve(capabilities.bank, capabilities.account_type)
        else {
            return Err(DispatchFailure::new(
                FailureKind::NoAccount,
                Some(name),
                format!(
                    "no active {} {} account",
                    capabilities.bank.as_str(),
                    capabilities.account_type.as_str()
                ),
            ));
        };

        let Some(result) = parser.parse(email) else {
            return Err(DispatchFailure::new(
                FailureKind::ParseError,
                Some(name),
                "email was claimed but its content did not match the expected structure",
            ));
        };

        validate(&result, email.date)
            .map_err(|reason| DispatchFailure::new(FailureKind::ValidationError, Some(name), reason))?;

        Ok(Dispatched {
            parser: name,
            capabilities,
            account_id,
            result,
        })
    }
}

/// Check a parsed value against domain rules.
///
/// Dates may run at most one day past the email's own date to allow for
/// time-zone skew between the bank and the mail server.
///
/// # Errors
///
/// Returns a description of the first violated rule.
pub fn validate(result: &ParseResult, sent: DateTime<Utc>) -> Result<(), String> {
    let last4 = result.last4();
    if last4.len() != 4 || !last4.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("last four digits {last4:?} are not four digits"));
    }

    let latest = sent.date_naive().checked_add_days(Days::new(1));
    let check_date = |date: chrono::NaiveDate| match latest {
        Some(latest) if date > latest => Err(format!("date {date} is after the alert was sent")),
        _ => Ok(()),
    };

    match result {
        ParseResult::Transaction(txn) => {
            if txn.amount.is_zero() {
                return Err("transaction amount is zero".to_string());
            }
            if txn.merchant.trim().is_empty() {
                return Err("transaction has no merchant".to_string());
            }
            check_date(txn.date)
        }
        ParseResult::Payment(payment) => {
            if payment.amount.is_sign_negative() || payment.amount.is_zero() {
                return Err(format!("payment amount {} is not positive", payment.amount));
            }
            check_date(payment.date)
        }
        ParseResult::CreditUpdate(update) => {
            if update.available_credit.is_sign_negative() && !update.available_credit.is_zero() {
                return Err(format!(
                    "available credit {} is negative",
                    update.available_credit
                ));
            }
            Ok(())
        }
        ParseResult::AccountBalance(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::email::{SyncSourceId, UserId};
    use crate::model::{ParsedCreditUpdate, ParsedTransaction};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn any_account(_: Bank, _: AccountType) -> Option<AccountId> {
        Some(AccountId(99))
    }

    fn no_account(_: Bank, _: AccountType) -> Option<AccountId> {
        None
    }

    fn email(from: &str, subject: &str, body: &str) -> EmailMessage {
        EmailMessage::new(
            UserId(1),
            SyncSourceId(1),
            1,
            from,
            subject,
            body,
            Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap(),
        )
    }

    /// Claims everything from one sender and always yields the same transaction.
    struct Fixed {
        name: &'static str,
        sender: &'static str,
        amount: i64,
    }

    impl AlertParser for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new(Bank::Chase, AccountType::CreditCard, AlertKind::Transaction)
        }

        fn can_parse(&self, email: &EmailMessage) -> bool {
            email.from_address.contains(self.sender)
        }

        fn parse(&self, _email: &EmailMessage) -> Option<ParseResult> {
            Some(ParseResult::Transaction(ParsedTransaction {
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                amount: Decimal::new(self.amount, 2),
                merchant: self.name.to_string(),
                card_last4: "0001".to_string(),
                pending: false,
            }))
        }
    }

    #[test]
    fn test_first_registered_match_wins() {
        let specific_first = Dispatcher::new(
            ParserRegistry::new()
                .with(Fixed { name: "specific", sender: "alerts@bank.com", amount: -1 })
                .with(Fixed { name: "general", sender: "bank.com", amount: -2 }),
        );
        let general_first = Dispatcher::new(
            ParserRegistry::new()
                .with(Fixed { name: "general", sender: "bank.com", amount: -2 })
                .with(Fixed { name: "specific", sender: "alerts@bank.com", amount: -1 }),
        );
        let message = email("alerts@bank.com", "Alert", "body");

        assert_eq!(
            specific_first.dispatch(&message, &any_account).unwrap().parser,
            "specific"
        );
        // A general parser registered first shadows the specific one.
        assert_eq!(
            general_first.dispatch(&message, &any_account).unwrap().parser,
            "general"
        );
    }

    #[test]
    fn test_unknown_sender_is_no_parser() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
        let failure = dispatcher
            .dispatch(&email("news@shop.example", "Sale!", "50% off"), &any_account)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::NoParser);
        assert!(failure.parser.is_none());
    }

    #[test]
    fn test_claimed_but_unparseable_is_parse_error() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
        let failure = dispatcher
            .dispatch(
                &email("no.reply.alerts@chase.com", "Your transaction alert", "garbled"),
                &any_account,
            )
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ParseError);
        assert_eq!(failure.parser, Some("chase_credit_transaction"));
    }

    #[test]
    fn test_purchase_at_payment_merchant_is_a_transaction() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
        let dispatched = dispatcher
            .dispatch(
                &email(
                    "no.reply.alerts@chase.com",
                    "Your $12.34 transaction with VENMO PAYMENT",
                    "Your $12.34 at VENMO PAYMENT was approved on your credit card ending in 5678.",
                ),
                &any_account,
            )
            .unwrap();

        assert_eq!(dispatched.parser, "chase_credit_transaction");
        let ParseResult::Transaction(txn) = dispatched.result else {
            panic!("expected a transaction");
        };
        assert_eq!(txn.merchant, "VENMO PAYMENT");
    }

    #[test]
    fn test_unhandled_kind_is_unsupported_type() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults())
            .with_handled_kinds([AlertKind::Transaction, AlertKind::Balance]);
        let failure = dispatcher
            .dispatch(
                &email(
                    "no.reply.alerts@chase.com",
                    "Payment received",
                    "We've received your payment of $25.00 for your card ending in 5678.",
                ),
                &any_account,
            )
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::UnsupportedType);
    }

    #[test]
    fn test_missing_account_is_no_account() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
        let failure = dispatcher
            .dispatch(
                &email(
                    "no.reply.alerts@chase.com",
                    "Transaction",
                    "Your $12.34 at STRIPE-Z.AI was approved on your card ending in 5678.",
                ),
                &no_account,
            )
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::NoAccount);
    }

    #[test]
    fn test_zero_amount_is_validation_error() {
        let dispatcher = Dispatcher::new(ParserRegistry::new().with(Fixed {
            name: "zero",
            sender: "bank.com",
            amount: 0,
        }));
        let failure = dispatcher
            .dispatch(&email("alerts@bank.com", "Alert", "body"), &any_account)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(failure.trail().contains("parser: zero"));
    }

    #[test]
    fn test_validate_rejects_future_dates_and_bad_last4() {
        let sent = Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap();
        let future = ParseResult::Transaction(ParsedTransaction {
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            amount: Decimal::new(-100, 2),
            merchant: "SHOP".to_string(),
            card_last4: "1234".to_string(),
            pending: false,
        });
        assert!(validate(&future, sent).is_err());

        let bad_last4 = ParseResult::CreditUpdate(ParsedCreditUpdate {
            available_credit: Decimal::new(100, 0),
            card_last4: "12a4".to_string(),
        });
        assert!(validate(&bad_last4, sent).is_err());
    }

    #[test]
    fn test_successful_dispatch_carries_account() {
        let dispatcher = Dispatcher::new(ParserRegistry::with_defaults());
        let dispatched = dispatcher
            .dispatch(
                &email(
                    "alerts@notify.wellsfargo.com",
                    "Deposit",
                    "A deposit of $123.45 was made to your account ********1234. Transaction Date: January 01, 2026",
                ),
                &any_account,
            )
            .unwrap();

        assert_eq!(dispatched.account_id, AccountId(99));
        assert_eq!(dispatched.capabilities.bank, Bank::WellsFargo);
        assert_eq!(dispatched.result.alert_kind(), AlertKind::Transaction);
    }
}
