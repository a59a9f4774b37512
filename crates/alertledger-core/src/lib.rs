//! # alertledger-core
//!
//! Storage and ingestion pipeline for bank alert emails.
//!
//! This crate provides:
//! - Local storage (`SQLite`) shared by all repositories
//! - **Sync Sources** - monitored mailboxes, their status and UID checkpoint
//! - **Idempotency Ledger** - one entry per handled message
//! - **Records** - transactions and balance updates derived from alerts
//! - **Dead-Letter Queue** - messages that could not be converted
//! - **Ingestion** - sync cycles driving a [`MailFetcher`] through dispatch

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod db;
pub mod dlq;
mod error;
pub mod ledger;
pub mod records;
pub mod service;
pub mod sync_source;

pub use alertledger_parse::{
    AccountId, AccountLookup, AccountType, AlertKind, Bank, DispatchFailure, Dispatched,
    Dispatcher, EmailMessage, FailureKind, ParseResult, ParserRegistry, SyncSourceId, UserId,
};
pub use db::Database;
pub use dlq::{DeadLetter, DlqRepository};
pub use error::{Error, Result};
pub use ledger::{MessageKey, ProcessedEmailRepository};
pub use records::{BalanceType, BalanceUpdate, BalanceUpdateRepository, Transaction, TransactionRepository};
pub use service::{CycleReport, FetchError, Ingestor, MailFetcher, MessageOutcome};
pub use sync_source::{NewSyncSource, SyncSource, SyncSourceRepository, SyncSourceStatus};
