//! Normalized financial records derived from alerts.

mod model;
mod repository;

pub use model::{BalanceType, BalanceUpdate, NewBalanceUpdate, NewTransaction, RecordRef, Transaction};
pub use repository::{BalanceUpdateRepository, TransactionRepository};
