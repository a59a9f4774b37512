//! Ingestion services.
//!
//! This module bridges the mail collaborator with the dispatcher and the
//! repositories: one sync cycle per source, one transaction per message.

mod fetch;
mod ingest;

pub use fetch::{FetchError, MailFetcher};
pub use ingest::{CycleReport, EMAIL_ALERT_SOURCE, Ingestor, MessageOutcome, PAYMENT_MERCHANT};
