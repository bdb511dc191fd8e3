//! Store error types.

use thiserror::Error;

use crate::DocumentKey;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when using a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A version precondition failed at commit time.
    #[error("Concurrent modification: {0}")]
    Conflict(DocumentKey),

    /// Failed to serialize or deserialize a value.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed to perform the operation.
    #[error("Store operation failed: {0}")]
    Backend(String),
}

/// Errors surfaced by [`TxnExecutor::run`](crate::TxnExecutor::run).
#[derive(Error, Debug)]
pub enum TxnError<E> {
    /// The transaction body rejected the data it read. Nothing was written.
    #[error("transaction aborted: {0}")]
    Aborted(E),

    /// Every attempt lost a race against a concurrent writer.
    #[error("transaction conflict after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The store itself failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
