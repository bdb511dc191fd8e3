//! Concurrent writers racing on the same document.

use std::convert::Infallible;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use shelf_store::{
    BackoffStrategy, DocumentKey, DocumentStore, MemoryStore, RetryPolicy, TxnExecutor, TxnPlan,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_increments_never_lose_updates() {
    const WRITERS: u32 = 24;

    let store = Arc::new(MemoryStore::new());
    // Each failed attempt means some other writer committed, so WRITERS
    // attempts are always enough for everyone.
    let policy = RetryPolicy::new(WRITERS).with_backoff(BackoffStrategy::None);
    let executor = TxnExecutor::new(store.clone(), policy);
    let key = DocumentKey::new("counters", "hits");

    let tasks = (0..WRITERS).map(|_| {
        let executor = executor.clone();
        let key = key.clone();
        tokio::spawn(async move {
            executor
                .run(&[key.clone()], |reads| {
                    let n = reads.get(&key).and_then(Value::as_u64).unwrap_or(0);
                    Ok::<_, Infallible>(TxnPlan::new(n).with_write(key.clone(), json!(n + 1)))
                })
                .await
        })
    });

    let mut seen: Vec<u64> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().value)
        .collect();
    seen.sort_unstable();

    let expected: Vec<u64> = (0..u64::from(WRITERS)).collect();
    assert_eq!(seen, expected);
    assert_eq!(
        store.read(&key).await.unwrap().unwrap().value,
        json!(WRITERS)
    );
}
