//! Error types for the parsing layer.

/// Result type alias for parsing-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when decoding stored codes back into domain enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Unknown bank code.
    #[error("Unknown bank: {0}")]
    UnknownBank(String),

    /// Unknown account type code.
    #[error("Unknown account type: {0}")]
    UnknownAccountType(String),

    /// Unknown alert kind code.
    #[error("Unknown alert kind: {0}")]
    UnknownAlertKind(String),

    /// Unknown failure taxonomy code.
    #[error("Unknown failure kind: {0}")]
    UnknownFailureKind(String),
}
