//! Document store trait and the in-process implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{DocumentKey, StoreError, StoreResult, Version, Versioned, WriteBatch};

/// Backend holding versioned JSON documents.
///
/// Implementations must apply a [`WriteBatch`] atomically: either every
/// precondition holds and every write lands, or nothing changes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document and the version it is currently at.
    async fn read(&self, key: &DocumentKey) -> StoreResult<Option<Versioned<Value>>>;

    /// Commit a batch of writes guarded by version preconditions.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// List every document in a collection.
    async fn scan(&self, collection: &str) -> StoreResult<Vec<(DocumentKey, Versioned<Value>)>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn read(&self, key: &DocumentKey) -> StoreResult<Option<Versioned<Value>>> {
        (**self).read(key).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).commit(batch).await
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<(DocumentKey, Versioned<Value>)>> {
        (**self).scan(collection).await
    }
}

/// In-memory document store.
///
/// Commits take a write lock over the whole map, so precondition checks and
/// writes are observed together by every reader.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<DocumentKey, Versioned<Value>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally write a document, bumping its version.
    ///
    /// Intended for seeding and for simulating writers outside any
    /// transaction.
    pub async fn put(&self, key: DocumentKey, value: Value) -> Version {
        let mut docs = self.docs.write().await;
        write_doc(&mut docs, key, value)
    }

    /// Number of documents across all collections.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

fn write_doc(
    docs: &mut HashMap<DocumentKey, Versioned<Value>>,
    key: DocumentKey,
    value: Value,
) -> Version {
    let version = docs
        .get(&key)
        .map(|d| d.version.next())
        .unwrap_or(Version::INITIAL);
    docs.insert(key, Versioned { value, version });
    version
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, key: &DocumentKey) -> StoreResult<Option<Versioned<Value>>> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut docs = self.docs.write().await;

        for (key, precondition) in &batch.checks {
            let current = docs.get(key).map(|d| d.version);
            if !precondition.holds(current) {
                tracing::debug!(key = %key, ?precondition, ?current, "precondition failed");
                return Err(StoreError::Conflict(key.clone()));
            }
        }

        for (key, value) in batch.writes {
            write_doc(&mut docs, key, value);
        }

        Ok(())
    }

    async fn scan(&self, collection: &str) -> StoreResult<Vec<(DocumentKey, Versioned<Value>)>> {
        let docs = self.docs.read().await;
        let mut found: Vec<_> = docs
            .iter()
            .filter(|(k, _)| k.collection() == collection)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Precondition;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_bumps_version() {
        let store = MemoryStore::new();
        let key = DocumentKey::new("products", "a");

        assert_eq!(store.put(key.clone(), json!({"stock": 1})).await, Version::INITIAL);
        assert_eq!(store.put(key.clone(), json!({"stock": 2})).await, Version::new(2));

        let doc = store.read(&key).await.unwrap().unwrap();
        assert_eq!(doc.value, json!({"stock": 2}));
        assert_eq!(doc.version, Version::new(2));
    }

    #[tokio::test]
    async fn test_commit_checks_preconditions() {
        let store = MemoryStore::new();
        let key = DocumentKey::new("products", "a");
        store.put(key.clone(), json!({"stock": 5})).await;

        let stale = WriteBatch::new()
            .check(key.clone(), Precondition::AtVersion(Version::new(7)))
            .put(key.clone(), json!({"stock": 0}));
        assert!(matches!(
            store.commit(stale).await,
            Err(StoreError::Conflict(k)) if k == key
        ));
        assert_eq!(store.read(&key).await.unwrap().unwrap().value, json!({"stock": 5}));

        let fresh = WriteBatch::new()
            .check(key.clone(), Precondition::AtVersion(Version::INITIAL))
            .put(key.clone(), json!({"stock": 4}));
        store.commit(fresh).await.unwrap();
        assert_eq!(store.read(&key).await.unwrap().unwrap().value, json!({"stock": 4}));
    }

    #[tokio::test]
    async fn test_failed_check_leaves_other_writes_unapplied() {
        let store = MemoryStore::new();
        let a = DocumentKey::new("products", "a");
        let b = DocumentKey::new("products", "b");
        store.put(b.clone(), json!({"stock": 1})).await;

        let batch = WriteBatch::new()
            .check(a.clone(), Precondition::Absent)
            .check(b.clone(), Precondition::Absent)
            .put(a.clone(), json!({"stock": 9}))
            .put(b.clone(), json!({"stock": 9}));
        assert!(store.commit(batch).await.is_err());
        assert!(store.read(&a).await.unwrap().is_none());
        assert_eq!(store.read(&b).await.unwrap().unwrap().value, json!({"stock": 1}));
    }

    #[tokio::test]
    async fn test_scan_filters_collection() {
        let store = MemoryStore::new();
        store.put(DocumentKey::new("products", "b"), json!({})).await;
        store.put(DocumentKey::new("products", "a"), json!({})).await;
        store.put(DocumentKey::new("carts", "u1"), json!({})).await;

        let products = store.scan("products").await.unwrap();
        let ids: Vec<_> = products.iter().map(|(k, _)| k.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.len().await, 3);
    }
}
