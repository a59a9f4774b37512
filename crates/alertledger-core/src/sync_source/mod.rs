//! Monitored mailboxes and their checkpoint state.

mod model;
mod repository;

pub use model::{ActiveAccounts, NewSyncSource, SyncSource, SyncSourceStatus};
pub use repository::SyncSourceRepository;
