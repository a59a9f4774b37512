//! Parser capabilities, parsed value objects and the failure taxonomy.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bank that sends the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bank {
    /// Chase.
    Chase,
    /// Wells Fargo.
    WellsFargo,
    /// Capital One.
    CapitalOne,
}

impl Bank {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chase => "chase",
            Self::WellsFargo => "wells_fargo",
            Self::CapitalOne => "capital_one",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBank`] for unrecognized codes.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chase" => Ok(Self::Chase),
            "wells_fargo" => Ok(Self::WellsFargo),
            "capital_one" => Ok(Self::CapitalOne),
            _ => Err(Error::UnknownBank(s.to_string())),
        }
    }
}

/// Kind of account an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Credit card account.
    CreditCard,
    /// Checking (deposit) account.
    Checking,
}

impl AccountType {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Checking => "checking",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAccountType`] for unrecognized codes.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "credit_card" => Ok(Self::CreditCard),
            "checking" => Ok(Self::Checking),
            _ => Err(Error::UnknownAccountType(s.to_string())),
        }
    }
}

/// The kind of alert a parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Purchase, deposit or withdrawal.
    Transaction,
    /// Balance or available-credit notice.
    Balance,
    /// Card payment received.
    Payment,
}

impl AlertKind {
    /// Every alert kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Transaction, Self::Balance, Self::Payment];

    /// Convert to configuration string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Balance => "balance",
            Self::Payment => "payment",
        }
    }

    /// Parse from configuration string representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAlertKind`] for unrecognized codes.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "transaction" => Ok(Self::Transaction),
            "balance" => Ok(Self::Balance),
            "payment" => Ok(Self::Payment),
            _ => Err(Error::UnknownAlertKind(s.to_string())),
        }
    }
}

/// What a parser declares it handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Sending bank.
    pub bank: Bank,
    /// Account type the alert refers to.
    pub account_type: AccountType,
    /// Alert kind produced.
    pub alert_kind: AlertKind,
}

impl Capabilities {
    /// Create a capability set.
    #[must_use]
    pub const fn new(bank: Bank, account_type: AccountType, alert_kind: AlertKind) -> Self {
        Self {
            bank,
            account_type,
            alert_kind,
        }
    }
}

/// A card or account movement. Negative amounts are outflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    /// Transaction date.
    pub date: NaiveDate,
    /// Signed amount.
    pub amount: Decimal,
    /// Merchant or counterparty description.
    pub merchant: String,
    /// Last four digits of the card or account.
    pub card_last4: String,
    /// Whether the bank reported the charge as pending.
    pub pending: bool,
}

/// New available credit on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCreditUpdate {
    /// Available credit after the change.
    pub available_credit: Decimal,
    /// Last four digits of the card.
    pub card_last4: String,
}

/// A payment received on a card. The amount is positive (inflow to the card).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayment {
    /// Payment amount.
    pub amount: Decimal,
    /// Posting date.
    pub date: NaiveDate,
    /// Last four digits of the card.
    pub card_last4: String,
}

/// Current balance of a deposit account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAccountBalance {
    /// Reported balance.
    pub balance: Decimal,
    /// Last four digits of the account.
    pub account_last4: String,
}

/// Output of a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A transaction alert.
    Transaction(ParsedTransaction),
    /// An available-credit alert.
    CreditUpdate(ParsedCreditUpdate),
    /// A payment confirmation.
    Payment(ParsedPayment),
    /// A deposit account balance notice.
    AccountBalance(ParsedAccountBalance),
}

impl ParseResult {
    /// Alert kind this result belongs to.
    #[must_use]
    pub const fn alert_kind(&self) -> AlertKind {
        match self {
            Self::Transaction(_) => AlertKind::Transaction,
            Self::CreditUpdate(_) | Self::AccountBalance(_) => AlertKind::Balance,
            Self::Payment(_) => AlertKind::Payment,
        }
    }

    /// Last four digits of the card or account the result refers to.
    #[must_use]
    pub fn last4(&self) -> &str {
        match self {
            Self::Transaction(t) => &t.card_last4,
            Self::CreditUpdate(c) => &c.card_last4,
            Self::Payment(p) => &p.card_last4,
            Self::AccountBalance(b) => &b.account_last4,
        }
    }
}

/// Closed taxonomy of per-message failures recorded in the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No registered parser claimed the message.
    NoParser,
    /// A parser claimed the message but could not extract its fields.
    ParseError,
    /// The extracted values violate a domain rule.
    ValidationError,
    /// The user has no active account for the resolved bank and account type.
    NoAccount,
    /// The claiming parser's alert kind has no handling path.
    UnsupportedType,
}

impl FailureKind {
    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoParser => "NO_PARSER",
            Self::ParseError => "PARSE_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NoAccount => "NO_ACCOUNT",
            Self::UnsupportedType => "UNSUPPORTED_TYPE",
        }
    }

    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFailureKind`] for unrecognized codes.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "NO_PARSER" => Ok(Self::NoParser),
            "PARSE_ERROR" => Ok(Self::ParseError),
            "VALIDATION_ERROR" => Ok(Self::ValidationError),
            "NO_ACCOUNT" => Ok(Self::NoAccount),
            "UNSUPPORTED_TYPE" => Ok(Self::UnsupportedType),
            _ => Err(Error::UnknownFailureKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_codes() {
        for kind in [
            FailureKind::NoParser,
            FailureKind::ParseError,
            FailureKind::ValidationError,
            FailureKind::NoAccount,
            FailureKind::UnsupportedType,
        ] {
            assert_eq!(FailureKind::parse(kind.as_str()), Ok(kind));
        }
        assert!(FailureKind::parse("no_parser").is_err());
    }

    #[test]
    fn test_bank_codes_are_case_insensitive() {
        assert_eq!(Bank::parse("WELLS_FARGO"), Ok(Bank::WellsFargo));
        assert_eq!(
            Bank::parse("acme"),
            Err(Error::UnknownBank("acme".to_string()))
        );
    }

    #[test]
    fn test_balance_results_share_alert_kind() {
        let credit = ParseResult::CreditUpdate(ParsedCreditUpdate {
            available_credit: Decimal::new(100, 0),
            card_last4: "5678".to_string(),
        });
        let balance = ParseResult::AccountBalance(ParsedAccountBalance {
            balance: Decimal::new(100, 0),
            account_last4: "1234".to_string(),
        });

        assert_eq!(credit.alert_kind(), AlertKind::Balance);
        assert_eq!(balance.alert_kind(), AlertKind::Balance);
        assert_eq!(credit.last4(), "5678");
    }
}
