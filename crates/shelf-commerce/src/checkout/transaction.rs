//! The checkout transaction.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{DocumentKey, TxnError, TxnExecutor, TxnPlan};
use tracing::{info, warn};

use crate::cart::CartLine;
use crate::catalog::{normalize_product, product_key, write_stock};
use crate::checkout::{validate, Decrement};
use crate::error::{CheckoutError, CommerceError};
use crate::ids::ProductId;
use crate::money::Currency;

/// Proof of a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// Every pool that was decremented.
    pub decrements: Vec<Decrement>,
    /// Products whose records were rewritten.
    pub products: Vec<ProductId>,
    /// Transaction attempts, 1 when nothing raced.
    pub attempts: u32,
    pub committed_at: DateTime<Utc>,
}

impl CheckoutReceipt {
    pub fn units(&self) -> i64 {
        self.decrements.iter().map(Decrement::units).sum()
    }
}

/// Validate and decrement stock for every line, or change nothing.
///
/// Reads each distinct product record once per attempt. If another writer
/// touches one of them before the commit lands, the whole read and validate
/// sequence runs again, up to the executor's retry policy.
pub async fn execute(
    executor: &TxnExecutor,
    lines: &[CartLine],
    currency: Currency,
) -> Result<CheckoutReceipt, CommerceError> {
    if lines.is_empty() {
        return Err(CommerceError::EmptyCart);
    }

    let ids: BTreeSet<ProductId> = lines.iter().map(|l| l.product_id.clone()).collect();
    let keys: Vec<DocumentKey> = ids.iter().map(product_key).collect();

    let result = executor
        .run(&keys, |reads| {
            let products = ids
                .iter()
                .filter_map(|id| {
                    reads
                        .get(&product_key(id))
                        .map(|raw| (id.clone(), normalize_product(id, raw, currency)))
                })
                .collect::<HashMap<_, _>>();

            let plan = validate(lines, &products)?;
            let now = Utc::now();

            let writes = plan.writes();
            let mut txn = TxnPlan::new(CheckoutReceipt {
                products: writes.keys().cloned().collect(),
                decrements: plan.decrements,
                attempts: 0,
                committed_at: now,
            });
            for (id, write) in &writes {
                let key = product_key(id);
                let mut doc = reads.get(&key).cloned().unwrap_or_default();
                write_stock(&mut doc, write, now);
                txn.write(key, doc);
            }
            Ok::<_, CheckoutError>(txn)
        })
        .await;

    match result {
        Ok(committed) => {
            let mut receipt = committed.value;
            receipt.attempts = committed.attempts;
            info!(
                products = receipt.products.len(),
                units = receipt.units(),
                attempts = receipt.attempts,
                "Checkout committed"
            );
            Ok(receipt)
        }
        Err(TxnError::Aborted(e)) => {
            warn!(error = %e, "Checkout rejected");
            Err(e.into())
        }
        Err(TxnError::Conflict { attempts }) => {
            warn!(attempts, "Checkout gave up after conflicts");
            Err(CheckoutError::TransactionConflict { attempts }.into())
        }
        Err(TxnError::Store(e)) => Err(e.into()),
    }
}
