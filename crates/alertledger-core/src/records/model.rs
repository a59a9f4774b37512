//! Financial record models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{AccountId, SyncSourceId, UserId};

/// A persisted transaction. Negative amounts are outflows, positive inflows,
/// whichever bank reported them.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Row identifier.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Account the transaction belongs to.
    pub account_id: AccountId,
    /// Mailbox it was ingested from.
    pub sync_source_id: Option<SyncSourceId>,
    /// Ledger entry of the source message.
    pub processed_email_id: Option<i64>,
    /// Transaction date.
    pub date: NaiveDate,
    /// Signed amount.
    pub amount: Decimal,
    /// Merchant or counterparty.
    pub merchant: String,
    /// Last four digits of the card or account.
    pub card_last4: String,
    /// Whether the bank reported it as pending.
    pub pending: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Fields for a new transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Owner.
    pub user_id: UserId,
    /// Account.
    pub account_id: AccountId,
    /// Mailbox it was ingested from.
    pub sync_source_id: SyncSourceId,
    /// Ledger entry of the source message.
    pub processed_email_id: i64,
    /// Transaction date.
    pub date: NaiveDate,
    /// Signed amount.
    pub amount: Decimal,
    /// Merchant or counterparty.
    pub merchant: String,
    /// Last four digits of the card or account.
    pub card_last4: String,
    /// Pending flag.
    pub pending: bool,
}

/// Which balance a [`BalanceUpdate`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceType {
    /// Available balance or available credit.
    AvailableBalance,
    /// Ledger (current) balance.
    CurrentBalance,
}

impl BalanceType {
    /// Parse from database string representation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidData`] for unrecognized codes.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "available_balance" => Ok(Self::AvailableBalance),
            "current_balance" => Ok(Self::CurrentBalance),
            _ => Err(crate::Error::InvalidData(format!("balance type {s:?}"))),
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AvailableBalance => "available_balance",
            Self::CurrentBalance => "current_balance",
        }
    }
}

/// A persisted balance observation.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceUpdate {
    /// Row identifier; breaks ties between updates sharing a date.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Account.
    pub account_id: AccountId,
    /// Mailbox it was ingested from.
    pub sync_source_id: Option<SyncSourceId>,
    /// Ledger entry of the source message.
    pub processed_email_id: Option<i64>,
    /// Balance kind.
    pub balance_type: BalanceType,
    /// Reported balance.
    pub new_balance: Decimal,
    /// Date the balance applies to.
    pub update_date: NaiveDate,
    /// Origin of the update, e.g. `email_alert`.
    pub update_source: String,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

/// Fields for a new balance update.
#[derive(Debug, Clone)]
pub struct NewBalanceUpdate {
    /// Owner.
    pub user_id: UserId,
    /// Account.
    pub account_id: AccountId,
    /// Mailbox it was ingested from.
    pub sync_source_id: Option<SyncSourceId>,
    /// Ledger entry of the source message.
    pub processed_email_id: Option<i64>,
    /// Balance kind.
    pub balance_type: BalanceType,
    /// Reported balance.
    pub new_balance: Decimal,
    /// Date the balance applies to.
    pub update_date: NaiveDate,
    /// Origin of the update.
    pub update_source: String,
}

/// Reference to the record a message produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    /// Row in `transactions`.
    Transaction(i64),
    /// Row in `balance_updates`.
    BalanceUpdate(i64),
}
