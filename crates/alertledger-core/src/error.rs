//! Error types for the core library.

use thiserror::Error;

use crate::SyncSourceId;
use crate::service::FetchError;

/// Errors that can occur in core operations.
///
/// Per-message conversion failures are not errors: they are recorded in the
/// dead-letter queue. Everything here is infrastructure-level.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Mail collaborator failed (authentication or network).
    #[error("Mail fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Stored code could not be decoded.
    #[error("Invalid stored code: {0}")]
    Code(#[from] alertledger_parse::Error),

    /// Stored value could not be decoded.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Sync source not found.
    #[error("Sync source not found: {0}")]
    SyncSourceNotFound(SyncSourceId),

    /// Sync source was soft-deleted.
    #[error("Sync source {0} is inactive")]
    SyncSourceInactive(SyncSourceId),

    /// Sync source is in the error state and must be reconnected first.
    #[error("Sync source {0} needs to be reconnected")]
    ReconnectRequired(SyncSourceId),

    /// Dead-letter entry not found for this user.
    #[error("Dead-letter entry not found: {0}")]
    DeadLetterNotFound(i64),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
