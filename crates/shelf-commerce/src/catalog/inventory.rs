//! Stock pools.
//!
//! A pool is one authoritative counter that purchases draw from. A product
//! without variants has a single base pool; a product with variants has one
//! pool per variant. Extras with tracked stock, and each extra variant, are
//! pools of their own.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ExtraId, ProductId, VariantId};

/// Which counter within a product record a purchase draws from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockPool {
    Base,
    Variant { variant_id: VariantId },
    Extra { extra_id: ExtraId },
    ExtraVariant { extra_id: ExtraId, variant_id: VariantId },
}

impl StockPool {
    /// Pool for a product purchase with an optional variant.
    pub fn for_selection(variant_id: Option<&VariantId>) -> Self {
        match variant_id {
            Some(id) => StockPool::Variant {
                variant_id: id.clone(),
            },
            None => StockPool::Base,
        }
    }
}

/// A pool qualified by the product record that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    pub product_id: ProductId,
    pub pool: StockPool,
}

impl PoolKey {
    pub fn new(product_id: ProductId, pool: StockPool) -> Self {
        Self { product_id, pool }
    }

    /// The product/variant pairing a cart line draws from.
    pub fn for_line(product_id: &ProductId, variant_id: Option<&VariantId>) -> Self {
        Self::new(product_id.clone(), StockPool::for_selection(variant_id))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pool {
            StockPool::Base => write!(f, "{}", self.product_id),
            StockPool::Variant { variant_id } => write!(f, "{}/{}", self.product_id, variant_id),
            StockPool::Extra { extra_id } => write!(f, "{}+{}", self.product_id, extra_id),
            StockPool::ExtraVariant {
                extra_id,
                variant_id,
            } => write!(f, "{}+{}/{}", self.product_id, extra_id, variant_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_pool_depends_on_variant() {
        let p = ProductId::new("tee");
        assert_eq!(PoolKey::for_line(&p, None).pool, StockPool::Base);
        assert_ne!(
            PoolKey::for_line(&p, Some(&VariantId::new("s"))),
            PoolKey::for_line(&p, Some(&VariantId::new("m")))
        );
    }

    #[test]
    fn test_pool_display() {
        let key = PoolKey::new(
            ProductId::new("tee"),
            StockPool::ExtraVariant {
                extra_id: ExtraId::new("wrap"),
                variant_id: VariantId::new("gold"),
            },
        );
        assert_eq!(key.to_string(), "tee+wrap/gold");
    }
}
