//! Sync source data models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AccountId, AccountLookup, AccountType, Bank, SyncSourceId, UserId};

/// Connection status of a sync source.
///
/// `Active → Error` happens only on infrastructure failures (authentication,
/// network). `Error → Active` happens on a successful reconnection check.
/// Per-message failures never change the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSourceStatus {
    /// Mailbox reachable; cycles run.
    #[default]
    Active,
    /// Last infrastructure check failed; cycles are skipped.
    Error,
}

impl SyncSourceStatus {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            _ => Self::Active,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

/// A monitored mailbox delivering alerts for one account.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSource {
    /// Unique identifier.
    pub id: SyncSourceId,
    /// Owner.
    pub user_id: UserId,
    /// Account the alerts belong to.
    pub account_id: AccountId,
    /// Bank sending the alerts.
    pub bank: Bank,
    /// Account type of `account_id`.
    pub account_type: AccountType,
    /// Mailbox address.
    pub email_address: String,
    /// Opaque, already-encrypted IMAP credentials owned by the mail collaborator.
    #[serde(skip)]
    pub imap_credentials: Option<Vec<u8>>,
    /// Connection status.
    pub status: SyncSourceStatus,
    /// Message of the failure that put the source in the error state.
    pub last_error: Option<String>,
    /// Highest UID terminally handled.
    pub last_processed_uid: Option<u32>,
    /// End of the last completed cycle.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// False once soft-deleted.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a user connects a mailbox.
#[derive(Debug, Clone)]
pub struct NewSyncSource {
    /// Owner.
    pub user_id: UserId,
    /// Account the alerts belong to.
    pub account_id: AccountId,
    /// Bank sending the alerts.
    pub bank: Bank,
    /// Account type of `account_id`.
    pub account_type: AccountType,
    /// Mailbox address.
    pub email_address: String,
    /// Opaque IMAP credentials.
    pub imap_credentials: Option<Vec<u8>>,
}

impl NewSyncSource {
    /// Create a source without stored credentials.
    #[must_use]
    pub fn new(
        user_id: UserId,
        account_id: AccountId,
        bank: Bank,
        account_type: AccountType,
        email_address: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            account_id,
            bank,
            account_type,
            email_address: email_address.into(),
            imap_credentials: None,
        }
    }
}

/// The user's active accounts keyed by bank and account type.
///
/// The source being synced takes precedence over the user's other sources for
/// the same combination.
#[derive(Debug, Clone, Default)]
pub struct ActiveAccounts {
    accounts: HashMap<(Bank, AccountType), AccountId>,
}

impl ActiveAccounts {
    /// Build the lookup for one cycle of `current`.
    #[must_use]
    pub fn for_source(current: &SyncSource, user_sources: &[SyncSource]) -> Self {
        let mut accounts = HashMap::new();
        for source in user_sources
            .iter()
            .filter(|s| s.is_active && s.user_id == current.user_id)
        {
            accounts
                .entry((source.bank, source.account_type))
                .or_insert(source.account_id);
        }
        if current.is_active {
            accounts.insert((current.bank, current.account_type), current.account_id);
        }
        Self { accounts }
    }
}

impl AccountLookup for ActiveAccounts {
    fn resolve(&self, bank: Bank, account_type: AccountType) -> Option<AccountId> {
        self.accounts.get(&(bank, account_type)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i64, account: i64, bank: Bank, is_active: bool) -> SyncSource {
        SyncSource {
            id: SyncSourceId(id),
            user_id: UserId(1),
            account_id: AccountId(account),
            bank,
            account_type: AccountType::CreditCard,
            email_address: "me@example.com".to_string(),
            imap_credentials: None,
            status: SyncSourceStatus::Active,
            last_error: None,
            last_processed_uid: None,
            last_synced_at: None,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [SyncSourceStatus::Active, SyncSourceStatus::Error] {
            assert_eq!(SyncSourceStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_current_source_takes_precedence() {
        let current = source(2, 20, Bank::Chase, true);
        let others = vec![
            source(1, 10, Bank::Chase, true),
            source(3, 30, Bank::CapitalOne, true),
            source(4, 40, Bank::WellsFargo, false),
        ];
        let accounts = ActiveAccounts::for_source(&current, &others);

        assert_eq!(
            accounts.resolve(Bank::Chase, AccountType::CreditCard),
            Some(AccountId(20))
        );
        assert_eq!(
            accounts.resolve(Bank::CapitalOne, AccountType::CreditCard),
            Some(AccountId(30))
        );
        assert_eq!(
            accounts.resolve(Bank::WellsFargo, AccountType::CreditCard),
            None
        );
    }
}
