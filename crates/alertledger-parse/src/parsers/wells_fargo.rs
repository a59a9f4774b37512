//! Wells Fargo checking account alerts.

use std::sync::LazyLock;

use regex::Regex;

use crate::email::EmailMessage;
use crate::model::{
    AccountType, AlertKind, Bank, Capabilities, ParseResult, ParsedAccountBalance,
    ParsedTransaction,
};
use crate::parser::{AlertParser, sent_by};
use crate::text::{compile, extract_email_body, parse_amount, parse_long_date};

const SENDER: &str = "alerts@notify.wellsfargo.com";

static MOVEMENT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\$([\d,]+\.\d{2}).*?account (?:ending in )?\*+(\d{4}).*?transaction date:? ([a-z]+\.? \d{1,2}, \d{4})",
    )
});

static BALANCE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)balance.*?account (?:ending in )?\*+(\d{4}).*?\$([\d,]+\.\d{2})")
});

static DEPOSIT_CLAIM: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\bdeposit of \$|\bnew deposit\b|\bdeposit (?:was|has been) (?:made|posted)\b")
});

/// Direction of a checking account movement, fixed per parser.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Inflow,
    Outflow,
}

fn parse_movement(
    email: &EmailMessage,
    direction: Direction,
    description: &str,
) -> Option<ParseResult> {
    let body = extract_email_body(email);
    let caps = MOVEMENT.captures(&body)?;

    let magnitude = parse_amount(&caps[1])?.abs();
    let amount = match direction {
        Direction::Inflow => magnitude,
        Direction::Outflow => -magnitude,
    };

    Some(ParseResult::Transaction(ParsedTransaction {
        date: parse_long_date(&caps[3].replace('.', ""))?,
        amount,
        merchant: description.to_string(),
        card_last4: caps[2].to_string(),
        pending: false,
    }))
}

fn mentions(email: &EmailMessage, needle: &str) -> bool {
    email.subject.to_lowercase().contains(needle)
        || extract_email_body(email).to_lowercase().contains(needle)
}

/// Deposits into a checking account. Always positive.
#[derive(Debug, Default, Clone, Copy)]
pub struct WellsFargoDepositParser;

impl AlertParser for WellsFargoDepositParser {
    fn name(&self) -> &'static str {
        "wells_fargo_checking_deposit"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::WellsFargo, AccountType::Checking, AlertKind::Transaction)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER)
            && (DEPOSIT_CLAIM.is_match(&email.subject)
                || DEPOSIT_CLAIM.is_match(&extract_email_body(email)))
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        parse_movement(email, Direction::Inflow, "Deposit")
    }
}

/// Withdrawals from a checking account. Always negative.
#[derive(Debug, Default, Clone, Copy)]
pub struct WellsFargoWithdrawalParser;

impl AlertParser for WellsFargoWithdrawalParser {
    fn name(&self) -> &'static str {
        "wells_fargo_checking_withdrawal"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::WellsFargo, AccountType::Checking, AlertKind::Transaction)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER) && mentions(email, "withdrawal")
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        parse_movement(email, Direction::Outflow, "Withdrawal")
    }
}

/// Daily balance summaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct WellsFargoBalanceParser;

impl AlertParser for WellsFargoBalanceParser {
    fn name(&self) -> &'static str {
        "wells_fargo_checking_balance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(Bank::WellsFargo, AccountType::Checking, AlertKind::Balance)
    }

    fn can_parse(&self, email: &EmailMessage) -> bool {
        sent_by(email, SENDER) && mentions(email, "balance")
    }

    fn parse(&self, email: &EmailMessage) -> Option<ParseResult> {
        let body = extract_email_body(email);
        let caps = BALANCE.captures(&body)?;

        Some(ParseResult::AccountBalance(ParsedAccountBalance {
            balance: parse_amount(&caps[2])?,
            account_last4: caps[1].to_string(),
        }))
    }
}
