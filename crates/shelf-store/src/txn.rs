//! Optimistic transactions over a [`DocumentStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    DocumentKey, DocumentStore, Precondition, RetryPolicy, StoreError, TxnError, Version,
    Versioned, WriteBatch,
};

/// Snapshot of every document a transaction attempt read.
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    docs: BTreeMap<DocumentKey, Option<Versioned<Value>>>,
}

impl ReadSet {
    /// Raw document contents, if the document exists.
    pub fn get(&self, key: &DocumentKey) -> Option<&Value> {
        self.docs.get(key)?.as_ref().map(|d| &d.value)
    }

    /// Version observed for a document, `None` if it did not exist.
    pub fn version(&self, key: &DocumentKey) -> Option<Version> {
        self.docs.get(key)?.as_ref().map(|d| d.version)
    }

    /// Whether the key was part of this read set.
    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.docs.contains_key(key)
    }

    fn preconditions(&self) -> impl Iterator<Item = (DocumentKey, Precondition)> + '_ {
        self.docs.iter().map(|(k, d)| {
            (
                k.clone(),
                Precondition::from_observed(d.as_ref().map(|d| d.version)),
            )
        })
    }
}

/// What a transaction body decided: its output plus the writes to commit.
#[derive(Debug, Clone)]
pub struct TxnPlan<T> {
    pub output: T,
    pub writes: Vec<(DocumentKey, Value)>,
}

impl<T> TxnPlan<T> {
    /// A plan with no writes yet.
    pub fn new(output: T) -> Self {
        Self {
            output,
            writes: Vec::new(),
        }
    }

    /// Add a document write.
    pub fn with_write(mut self, key: DocumentKey, value: Value) -> Self {
        self.writes.push((key, value));
        self
    }

    pub fn write(&mut self, key: DocumentKey, value: Value) {
        self.writes.push((key, value));
    }
}

/// Output of a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    pub value: T,
    /// How many attempts ran, including the successful one.
    pub attempts: u32,
}

/// Runs read-validate-commit units with optimistic concurrency control.
///
/// Each attempt reads the declared keys, hands the snapshot to the body, and
/// commits the body's writes guarded by "still at the version I read" checks
/// on every key read. A conflicting commit re-runs the body from a fresh read;
/// it never replays an old plan.
#[derive(Clone)]
pub struct TxnExecutor {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl TxnExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `body` until it commits, aborts, or exhausts the retry policy.
    ///
    /// # Returns
    /// - `Ok(Committed)` - The body's output after its writes landed
    /// - `Err(TxnError::Aborted)` - The body returned an error; nothing written
    /// - `Err(TxnError::Conflict)` - Every attempt hit a concurrent writer
    pub async fn run<T, E, F>(
        &self,
        keys: &[DocumentKey],
        mut body: F,
    ) -> Result<Committed<T>, TxnError<E>>
    where
        F: FnMut(&ReadSet) -> Result<TxnPlan<T>, E>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let reads = self.read_all(keys).await?;
            let plan = body(&reads).map_err(TxnError::Aborted)?;

            if plan.writes.is_empty() {
                return Ok(Committed {
                    value: plan.output,
                    attempts,
                });
            }

            let mut batch = WriteBatch::new();
            batch.checks.extend(reads.preconditions());
            batch.writes = plan.writes;

            match self.store.commit(batch).await {
                Ok(()) => {
                    if attempts > 1 {
                        tracing::debug!(attempts, "transaction committed after retry");
                    }
                    return Ok(Committed {
                        value: plan.output,
                        attempts,
                    });
                }
                Err(StoreError::Conflict(key)) => {
                    if !self.policy.allows_retry(attempts) {
                        tracing::warn!(key = %key, attempts, "transaction conflict, giving up");
                        return Err(TxnError::Conflict { attempts });
                    }
                    tracing::warn!(key = %key, attempts, "transaction conflict, retrying");
                    let delay = self.policy.backoff.delay_for_attempt(attempts - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(TxnError::Store(e)),
            }
        }
    }

    async fn read_all(&self, keys: &[DocumentKey]) -> Result<ReadSet, StoreError> {
        let mut reads = ReadSet::default();
        for key in keys {
            if reads.contains(key) {
                continue;
            }
            let doc = self.store.read(key).await?;
            reads.docs.insert(key.clone(), doc);
        }
        Ok(reads)
    }
}
