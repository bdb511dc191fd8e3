//! Checkout validation.
//!
//! Pure: takes canonical products and cart lines, returns either the stock
//! every touched pool must be set to or the first reason the cart cannot be
//! fulfilled. Demand is accumulated per pool in line order, so two lines that
//! each fit on their own but not together are rejected at the second one.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::catalog::{PoolKey, Product, StockPool, StockWrite};
use crate::error::CheckoutError;
use crate::ids::ProductId;

/// One pool's stock before and after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decrement {
    pub pool: PoolKey,
    pub before: i64,
    pub after: i64,
}

impl Decrement {
    pub fn units(&self) -> i64 {
        self.before - self.after
    }
}

/// Validated decrements, ready to commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockPlan {
    /// In the order pools were first touched.
    pub decrements: Vec<Decrement>,
}

impl StockPlan {
    /// Stock writes grouped by product record.
    pub(crate) fn writes(&self) -> BTreeMap<ProductId, StockWrite> {
        let mut writes: BTreeMap<ProductId, StockWrite> = BTreeMap::new();
        for d in &self.decrements {
            let write = writes.entry(d.pool.product_id.clone()).or_default();
            match &d.pool.pool {
                StockPool::Base => write.base = Some(d.after),
                StockPool::Variant { variant_id } => {
                    write.variants.insert(variant_id.clone(), d.after);
                }
                StockPool::Extra { extra_id } => {
                    write.extras.insert(extra_id.clone(), d.after);
                }
                StockPool::ExtraVariant {
                    extra_id,
                    variant_id,
                } => {
                    write
                        .extra_variants
                        .insert((extra_id.clone(), variant_id.clone()), d.after);
                }
            }
        }
        writes
    }

    pub fn units(&self) -> i64 {
        self.decrements.iter().map(Decrement::units).sum()
    }
}

/// Validate every line against canonical stock.
pub fn validate(
    lines: &[CartLine],
    products: &HashMap<ProductId, Product>,
) -> Result<StockPlan, CheckoutError> {
    let mut demand: Vec<(PoolKey, i64, i64)> = Vec::new();

    for line in lines.iter().filter(|l| l.quantity > 0) {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id.clone()))?;

        let stock = match &line.variant_id {
            Some(variant_id) => {
                product
                    .variant(variant_id)
                    .ok_or_else(|| CheckoutError::VariantNotFound {
                        product_id: product.id.clone(),
                        variant_id: variant_id.clone(),
                    })?
                    .stock
            }
            None => product.stock,
        };
        let requested = add_demand(&mut demand, line.pool(), stock, line.quantity);
        if requested > stock {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id.clone(),
                variant_id: line.variant_id.clone(),
                extra_id: None,
                available: stock,
                requested,
            });
        }

        for pick in &line.extras {
            let extra = product
                .extra(&pick.extra_id)
                .ok_or_else(|| CheckoutError::ExtraNotFound {
                    product_id: product.id.clone(),
                    extra_id: pick.extra_id.clone(),
                })?;
            let units = line.quantity.saturating_mul(pick.quantity.max(0));

            if let Some(stock) = extra.stock {
                let pool = PoolKey::new(
                    product.id.clone(),
                    StockPool::Extra {
                        extra_id: extra.id.clone(),
                    },
                );
                let requested = add_demand(&mut demand, pool, stock, units);
                if requested > stock {
                    return Err(CheckoutError::InsufficientExtraStock {
                        product_id: product.id.clone(),
                        extra_id: extra.id.clone(),
                        available: stock,
                        requested,
                    });
                }
            }

            if let Some(variant_id) = &pick.variant_id {
                let variant =
                    extra
                        .variant(variant_id)
                        .ok_or_else(|| CheckoutError::ExtraVariantNotFound {
                            product_id: product.id.clone(),
                            extra_id: extra.id.clone(),
                            variant_id: variant_id.clone(),
                        })?;
                let pool = PoolKey::new(
                    product.id.clone(),
                    StockPool::ExtraVariant {
                        extra_id: extra.id.clone(),
                        variant_id: variant_id.clone(),
                    },
                );
                let requested = add_demand(&mut demand, pool, variant.stock, units);
                if requested > variant.stock {
                    return Err(CheckoutError::InsufficientStock {
                        product_id: product.id.clone(),
                        variant_id: Some(variant_id.clone()),
                        extra_id: Some(extra.id.clone()),
                        available: variant.stock,
                        requested,
                    });
                }
            }
        }
    }

    Ok(StockPlan {
        decrements: demand
            .into_iter()
            .filter(|(_, _, units)| *units > 0)
            .map(|(pool, before, units)| Decrement {
                pool,
                before,
                after: before - units,
            })
            .collect(),
    })
}

/// Add `units` to a pool's running demand and return the new total.
fn add_demand(demand: &mut Vec<(PoolKey, i64, i64)>, pool: PoolKey, stock: i64, units: i64) -> i64 {
    if let Some((_, _, total)) = demand.iter_mut().find(|(p, _, _)| p == &pool) {
        *total = total.saturating_add(units);
        return *total;
    }
    demand.push((pool, stock, units));
    units
}
