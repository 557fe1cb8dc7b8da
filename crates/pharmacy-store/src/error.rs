//! Error types for storage.

use pharmacy_core::CommerceError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A row lock could not be taken or the commit lost a race.
    /// Transactions are retried before this reaches the caller.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A storefront rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CommerceError),
}

impl StoreError {
    /// The domain error, if this is one.
    #[must_use]
    pub fn as_domain(&self) -> Option<&CommerceError> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::Busy | rocksdb::ErrorKind::TimedOut | rocksdb::ErrorKind::TryAgain => {
                Self::Conflict(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}
