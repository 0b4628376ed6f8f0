use thiserror::Error;

use crate::Sequence;

/// Boxed error used to carry failures from foreign persistence layers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a transactional repository.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The transaction was rolled back; none of its operations were applied.
    #[error("Transaction of {operations} operation(s) rolled back: {reason}")]
    TransactionAborted { operations: usize, reason: String },

    /// The backing store reported a failure.
    #[error("Database backend error: {0}")]
    Backend(#[source] BoxError),

    /// An operation could not be encoded for the backing store.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Wraps a lower-layer failure.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }
}

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The expected sequence did not match the stored one.
    #[error(
        "Concurrency conflict for {aggregate_type} {aggregate_id}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: String,
        aggregate_id: String,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
