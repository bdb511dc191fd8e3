//! Product, variant and extra types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{PoolKey, StockPool};
use crate::ids::{ExtraId, ProductId, Sku, VariantId};
use crate::money::Money;

/// A product in the catalog.
///
/// Stock counts are never negative; [`normalize_product`](crate::catalog::normalize_product)
/// guarantees that for anything read from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Display price, used when no variant overrides it.
    pub price: Money,
    /// Base stock. Purchases that choose no variant draw on it, even when the
    /// product has variants; each variant draws on its own count instead.
    pub stock: i64,
    /// Sequential SKU, if one was assigned.
    pub sku: Option<Sku>,
    /// Purchasable variants, in display order.
    pub variants: Vec<ProductVariant>,
    /// Add-ons selectable per cart line, in display order.
    pub extras: Vec<Extra>,
    /// Last time a checkout or edit touched this record.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Create a product with no stock, variants or extras.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock: 0,
            sku: None,
            variants: Vec::new(),
            extras: Vec::new(),
            updated_at: None,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock.max(0);
        self
    }

    pub fn with_variant(mut self, variant: ProductVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extras.push(extra);
        self
    }

    /// Check if this product sells through variants.
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn variant(&self, id: &VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    pub fn extra(&self, id: &ExtraId) -> Option<&Extra> {
        self.extras.iter().find(|e| &e.id == id)
    }

    /// Unit price for a purchase of the given variant, or of the base
    /// product. `None` if the variant does not exist.
    pub fn unit_price(&self, variant: Option<&VariantId>) -> Option<Money> {
        match variant {
            Some(id) => self.variant(id).map(|v| v.price.unwrap_or(self.price)),
            None => Some(self.price),
        }
    }

    /// Stock of the pool a purchase draws from: the variant's own stock when
    /// a variant is chosen, the base stock otherwise. `None` if the variant
    /// does not exist.
    pub fn pool_stock(&self, variant: Option<&VariantId>) -> Option<i64> {
        match variant {
            Some(id) => self.variant(id).map(|v| v.stock),
            None => Some(self.stock),
        }
    }

    /// Every stock pool in this record with its count. `None` marks an
    /// extra whose own stock is untracked.
    pub fn pools(&self) -> Vec<(PoolKey, Option<i64>)> {
        let mut pools = vec![(PoolKey::new(self.id.clone(), StockPool::Base), Some(self.stock))];
        for v in &self.variants {
            let pool = StockPool::Variant {
                variant_id: v.id.clone(),
            };
            pools.push((PoolKey::new(self.id.clone(), pool), Some(v.stock)));
        }
        for e in &self.extras {
            let pool = StockPool::Extra {
                extra_id: e.id.clone(),
            };
            pools.push((PoolKey::new(self.id.clone(), pool), e.stock));
            for v in &e.variants {
                let pool = StockPool::ExtraVariant {
                    extra_id: e.id.clone(),
                    variant_id: v.id.clone(),
                };
                pools.push((PoolKey::new(self.id.clone(), pool), Some(v.stock)));
            }
        }
        pools
    }
}

/// A product variant (e.g., size/color combination) with its own stock pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVariant {
    /// Unique variant identifier within its parent.
    pub id: VariantId,
    /// Variant name (e.g., "Large / Blue").
    pub name: String,
    /// Price override; the parent's price applies when absent.
    pub price: Option<Money>,
    /// Own stock pool.
    pub stock: i64,
}

impl ProductVariant {
    pub fn new(id: impl Into<VariantId>, name: impl Into<String>, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: None,
            stock: stock.max(0),
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }
}

/// An add-on chosen per cart line (gift wrap, engraving, a side dish...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extra {
    pub id: ExtraId,
    pub name: String,
    /// Price per unit of the extra; free when absent.
    pub price: Option<Money>,
    /// Tracked stock; `None` means unlimited.
    pub stock: Option<i64>,
    /// Variants of the extra, same override rules as product variants.
    pub variants: Vec<ProductVariant>,
}

impl Extra {
    pub fn new(id: impl Into<ExtraId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: None,
            stock: None,
            variants: Vec::new(),
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock.max(0));
        self
    }

    pub fn with_variant(mut self, variant: ProductVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn variant(&self, id: &VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Per-unit price of the extra, honoring a chosen variant's override.
    pub fn unit_price(&self, variant: Option<&VariantId>) -> Option<Money> {
        let own = variant.and_then(|id| self.variant(id)).and_then(|v| v.price);
        own.or(self.price)
    }
}
