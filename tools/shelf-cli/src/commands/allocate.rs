//! Concurrent SKU allocation against a fresh store.

use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use shelf_commerce::SkuAllocator;
use shelf_store::{MemoryStore, TxnExecutor};
use tokio::sync::Semaphore;

use super::AllocateArgs;
use crate::context::Context;

#[derive(Debug, Serialize)]
struct AllocationReport {
    count: usize,
    concurrency: usize,
    skus: Vec<u64>,
    contiguous: bool,
}

/// Issue `count` SKUs with at most `concurrency` allocations in flight.
async fn allocate_all(
    allocator: &SkuAllocator,
    count: usize,
    concurrency: usize,
    mut on_done: impl FnMut(),
) -> Result<Vec<u64>> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let handles: Vec<_> = (0..count)
        .map(|_| {
            let allocator = allocator.clone();
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                allocator.allocate().await
            })
        })
        .collect();

    let mut skus = Vec::with_capacity(count);
    for handle in handles {
        let sku = handle.await.context("Allocation task panicked")??;
        skus.push(sku.get());
        on_done();
    }
    Ok(skus)
}

/// Run the allocate command.
pub async fn run(args: AllocateArgs, ctx: &Context) -> Result<()> {
    if args.count == 0 {
        bail!("--count must be at least 1");
    }
    let concurrency = args.concurrency.unwrap_or(args.count).clamp(1, args.count);

    let commerce = &ctx.config.commerce;
    commerce.validate()?;
    let policy = commerce.allocator_policy();
    if (policy.max_attempts as usize) < concurrency {
        ctx.output.warn(&format!(
            "allocator.max_attempts ({}) is below the concurrency ({}); some allocations may give up",
            policy.max_attempts, concurrency
        ));
    }

    let store = Arc::new(MemoryStore::new());
    let allocator = SkuAllocator::new(TxnExecutor::new(store, policy));

    let pb = ctx.output.progress(args.count as u64, "allocating");
    let mut skus = allocate_all(&allocator, args.count, concurrency, || pb.inc(1)).await?;
    pb.finish_and_clear();

    skus.sort_unstable();
    let contiguous = skus.iter().zip(1u64..).all(|(sku, expected)| *sku == expected);
    let report = AllocationReport {
        count: args.count,
        concurrency,
        skus,
        contiguous,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        ctx.output.header("SKU allocation");
        ctx.output.kv("allocated", &report.count.to_string());
        ctx.output.kv("concurrency", &report.concurrency.to_string());
        let listed: Vec<String> = report.skus.iter().map(u64::to_string).collect();
        ctx.output.kv("skus", &listed.join(", "));
    }

    if !report.contiguous {
        bail!("Issued SKUs are not unique and contiguous from 1");
    }
    ctx.output.success("Every SKU is unique");

    Ok(())
}
