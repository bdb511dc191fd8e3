//! Product catalog.
//!
//! [`Catalog`] is the last-known snapshot of canonical product records. Cart
//! admission checks run against it; only checkout reads the store directly.

mod document;
mod inventory;
mod product;

use std::collections::HashMap;

use shelf_store::{DocumentKey, DocumentStore, StoreResult};
use tracing::debug;

pub(crate) use document::{write_stock, StockWrite};
pub use document::{normalize_product, product_document};
pub use inventory::{PoolKey, StockPool};
pub use product::{Extra, Product, ProductVariant};

use crate::ids::ProductId;
use crate::money::Currency;

/// Collection holding canonical product records.
pub const PRODUCTS: &str = "products";

/// Store key of a product record.
pub fn product_key(id: &ProductId) -> DocumentKey {
    DocumentKey::new(PRODUCTS, id.as_str())
}

/// In-memory catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    currency: Currency,
    products: HashMap<ProductId, Product>,
}

impl Catalog {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            products: HashMap::new(),
        }
    }

    /// Build a snapshot from already-normalized products.
    pub fn from_products(currency: Currency, products: impl IntoIterator<Item = Product>) -> Self {
        let mut catalog = Self::new(currency);
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    /// Insert or replace a product.
    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn remove(&mut self, id: &ProductId) -> Option<Product> {
        self.products.remove(id)
    }

    /// Products sorted by id.
    pub fn products(&self) -> Vec<&Product> {
        let mut products: Vec<_> = self.products.values().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Replace the snapshot with every product record in the store.
    pub async fn refresh(&mut self, store: &dyn DocumentStore) -> StoreResult<()> {
        let records = store.scan(PRODUCTS).await?;
        self.products = records
            .into_iter()
            .map(|(key, doc)| {
                let id = ProductId::new(key.id());
                let product = normalize_product(&id, &doc.value, self.currency);
                (id, product)
            })
            .collect();
        debug!(products = self.products.len(), "Catalog refreshed");
        Ok(())
    }

    /// Re-read only the given products. Records that disappeared are dropped
    /// from the snapshot.
    pub async fn refresh_ids<'a, I>(&mut self, store: &dyn DocumentStore, ids: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = &'a ProductId>,
    {
        for id in ids {
            match store.read(&product_key(id)).await? {
                Some(doc) => {
                    let product = normalize_product(id, &doc.value, self.currency);
                    self.insert(product);
                }
                None => {
                    self.products.remove(id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shelf_store::MemoryStore;

    #[tokio::test]
    async fn test_refresh_normalizes_records() {
        let store = MemoryStore::new();
        store
            .put(
                DocumentKey::new(PRODUCTS, "mug"),
                json!({"name": "Mug", "price": 12.5, "stock": -2}),
            )
            .await;
        store
            .put(DocumentKey::new(PRODUCTS, "tee"), json!({"name": "Tee", "stock": "3"}))
            .await;
        store
            .put(DocumentKey::new("counters", "products"), json!({"nextValue": 4}))
            .await;

        let mut catalog = Catalog::new(Currency::USD);
        catalog.refresh(&store).await.unwrap();

        assert_eq!(catalog.len(), 2);
        let mug = catalog.get(&ProductId::new("mug")).unwrap();
        assert_eq!(mug.stock, 0);
        assert_eq!(mug.price.amount_cents, 1250);
        assert_eq!(catalog.get(&ProductId::new("tee")).unwrap().stock, 3);
        assert_eq!(catalog.products()[0].id, ProductId::new("mug"));
    }

    #[tokio::test]
    async fn test_refresh_ids_drops_missing() {
        let store = MemoryStore::new();
        store
            .put(DocumentKey::new(PRODUCTS, "mug"), json!({"stock": 7}))
            .await;

        let mut catalog = Catalog::new(Currency::USD);
        catalog.insert(Product::new("gone", "Gone", crate::money::Money::zero(Currency::USD)));
        let ids = [ProductId::new("mug"), ProductId::new("gone")];
        catalog.refresh_ids(&store, &ids).await.unwrap();

        assert_eq!(catalog.get(&ProductId::new("mug")).unwrap().stock, 7);
        assert!(catalog.get(&ProductId::new("gone")).is_none());
    }
}
