//! Idempotency ledger.
//!
//! Guarantees at most one derived record per `(sync_source_id, message_uid)`
//! under redelivery, retries after partial failure, and concurrent cycles.
//! A claim is always made inside the same transaction as the record it
//! guards, so neither is ever observed without the other.

mod model;
mod repository;

pub use model::{ClaimOutcome, MessageKey, ProcessedEmail, compare_hashes, content_hash};
pub use repository::ProcessedEmailRepository;
