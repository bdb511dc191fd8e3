//! Versioned document storage for Shelf.
//!
//! Provides the persistence seams the commerce core talks to:
//!
//! - [`DocumentStore`]: records keyed by collection and id, each carrying a
//!   monotonically increasing [`Version`], committed in batches guarded by
//!   version preconditions
//! - [`TxnExecutor`]: optimistic read-compute-commit transactions with a
//!   bounded [`RetryPolicy`]
//! - [`Cache`]: a key-value cache with automatic JSON serialization, used for
//!   client-local cart copies
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_store::{DocumentKey, MemoryStore, RetryPolicy, TxnExecutor, TxnPlan};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let executor = TxnExecutor::new(store, RetryPolicy::new(5));
//!
//! let key = DocumentKey::new("counters", "visits");
//! let committed = executor
//!     .run(&[key.clone()], |reads| {
//!         let current = reads.get(&key).and_then(|v| v.as_u64()).unwrap_or(0);
//!         Ok::<_, std::convert::Infallible>(
//!             TxnPlan::new(current + 1).with_write(key.clone(), (current + 1).into()),
//!         )
//!     })
//!     .await?;
//! ```

mod document;
mod error;
mod kv;
mod retry;
mod store;
mod txn;

pub use document::{DocumentKey, Precondition, Version, Versioned, WriteBatch};
pub use error::{StoreError, StoreResult, TxnError};
pub use kv::{Cache, KeyValueBackend, MemoryKv};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use store::{DocumentStore, MemoryStore};
pub use txn::{Committed, ReadSet, TxnExecutor, TxnPlan};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Cache, DocumentKey, DocumentStore, MemoryStore, ReadSet, RetryPolicy, StoreError,
        TxnError, TxnExecutor, TxnPlan, Version, Versioned,
    };
}
