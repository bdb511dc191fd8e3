//! Sequential SKU allocation and product creation.
//!
//! One counter record, `counters/products`, holds the next SKU to hand out.
//! Every allocation is a transaction over that record, so concurrent
//! allocations serialize through the store's version check and never return
//! the same value.

use chrono::Utc;
use serde_json::{json, Value};
use shelf_store::{DocumentKey, TxnError, TxnExecutor, TxnPlan};
use tracing::{debug, info};

use crate::catalog::{normalize_product, product_document, product_key, Product};
use crate::error::CommerceError;
use crate::ids::Sku;

/// Collection holding counters.
pub const COUNTERS: &str = "counters";

/// Key of the product SKU counter.
pub fn counter_key() -> DocumentKey {
    DocumentKey::new(COUNTERS, "products")
}

/// Issues SKUs and creates products.
#[derive(Clone)]
pub struct SkuAllocator {
    executor: TxnExecutor,
}

impl SkuAllocator {
    /// `executor`'s retry policy bounds how many times one allocation may
    /// lose to a concurrent one.
    pub fn new(executor: TxnExecutor) -> Self {
        Self { executor }
    }

    /// Take the next SKU.
    ///
    /// A missing counter bootstraps: the first SKU is 1 and the counter is
    /// left at 2.
    pub async fn allocate(&self) -> Result<Sku, CommerceError> {
        let key = counter_key();
        let result = self
            .executor
            .run(std::slice::from_ref(&key), |reads| {
                let current = reads.get(&key).and_then(next_value).unwrap_or(1);
                let next = current
                    .checked_add(1)
                    .ok_or(CommerceError::SkuExhausted(current))?;
                Ok::<_, CommerceError>(
                    TxnPlan::new(current).with_write(key.clone(), json!({ "nextValue": next })),
                )
            })
            .await;

        match result {
            Ok(committed) => {
                debug!(sku = committed.value, attempts = committed.attempts, "SKU allocated");
                Ok(Sku::new(committed.value))
            }
            Err(e) => Err(flatten(e)),
        }
    }

    /// Assign a SKU to `draft`, normalize it and write it.
    ///
    /// A `manual_sku` is used as given and the counter is not touched. Fails
    /// with [`CommerceError::ProductExists`] if the id is already taken.
    pub async fn create_product(
        &self,
        draft: Product,
        manual_sku: Option<Sku>,
    ) -> Result<Product, CommerceError> {
        let sku = match manual_sku {
            Some(sku) => sku,
            None => self.allocate().await?,
        };

        let mut product = draft;
        product.sku = Some(sku);
        product.updated_at = Some(Utc::now());
        let product = normalize_product(&product.id, &product_document(&product), product.price.currency);

        let key = product_key(&product.id);
        let doc = product_document(&product);
        let result = self
            .executor
            .run(std::slice::from_ref(&key), |reads| {
                if reads.get(&key).is_some() {
                    return Err(CommerceError::ProductExists(product.id.clone()));
                }
                Ok(TxnPlan::new(()).with_write(key.clone(), doc.clone()))
            })
            .await;

        match result {
            Ok(_) => {
                info!(product_id = %product.id, sku = %sku, manual = manual_sku.is_some(), "Product created");
                Ok(product)
            }
            Err(e) => Err(flatten(e)),
        }
    }
}

fn next_value(doc: &Value) -> Option<u64> {
    doc.get("nextValue")
        .and_then(Value::as_u64)
        .filter(|n| *n >= 1)
}

fn flatten(e: TxnError<CommerceError>) -> CommerceError {
    match e {
        TxnError::Aborted(e) => e,
        TxnError::Conflict { attempts } => CommerceError::AllocationConflict { attempts },
        TxnError::Store(e) => e.into(),
    }
}
