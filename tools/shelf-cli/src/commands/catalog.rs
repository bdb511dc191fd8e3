//! Catalog file loading and inspection.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use serde_json::Value;
use shelf_commerce::catalog::{normalize_product, product_key, Product};
use shelf_commerce::{Currency, ProductId};
use shelf_store::{DocumentStore, MemoryStore};

use super::{CatalogArgs, CatalogCommand};
use crate::context::Context;

/// Run the catalog command.
pub async fn run(args: CatalogArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CatalogCommand::Show { catalog } => show_catalog(&catalog, ctx),
    }
}

fn show_catalog(path: &str, ctx: &Context) -> Result<()> {
    let docs = load_catalog_file(&ctx.resolve_path(path))?;
    let currency = ctx.config.commerce.currency;
    let products: Vec<Product> = docs
        .iter()
        .map(|(id, doc)| normalize_product(id, doc, currency))
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&products);
        return Ok(());
    }

    ctx.output.header(&format!("Catalog ({} products)", products.len()));

    let widths = [24, 28, 12, 8, 10];
    ctx.output
        .table_row(&["POOL", "NAME", "PRICE", "SKU", "STOCK"], &widths);
    for product in &products {
        let sku = product
            .sku
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        for (pool, stock) in product.pools() {
            let stock = match stock {
                Some(n) => n.to_string(),
                None => "unlimited".to_string(),
            };
            ctx.output.table_row(
                &[
                    &pool.to_string(),
                    &product.name,
                    &product.price.display(),
                    &sku,
                    &stock,
                ],
                &widths,
            );
        }
    }

    Ok(())
}

/// Read raw product records from a JSON catalog file.
///
/// Accepts an array of records carrying an `id`, or an object keyed by id.
/// Records are returned as stored, sorted by id.
pub fn load_catalog_file(path: &Path) -> Result<Vec<(ProductId, Value)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let raw: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
    parse_catalog(raw)
}

fn parse_catalog(raw: Value) -> Result<Vec<(ProductId, Value)>> {
    let mut docs = BTreeMap::new();
    match raw {
        Value::Array(entries) => {
            for (i, entry) in entries.into_iter().enumerate() {
                let id = match entry.get("id") {
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => bail!("Catalog entry {} has no id", i),
                };
                if docs.insert(ProductId::new(id.clone()), entry).is_some() {
                    bail!("Duplicate product id in catalog: {}", id);
                }
            }
        }
        Value::Object(map) => {
            for (id, entry) in map {
                docs.insert(ProductId::new(id), entry);
            }
        }
        _ => bail!("Catalog must be a JSON array or object"),
    }
    Ok(docs.into_iter().collect())
}

/// Write every record into `store` as is.
pub async fn seed_store(store: &MemoryStore, docs: Vec<(ProductId, Value)>) {
    for (id, doc) in docs {
        store.put(product_key(&id), doc).await;
    }
}

/// Normalized view of one seeded product.
pub async fn read_product(
    store: &MemoryStore,
    id: &ProductId,
    currency: Currency,
) -> Result<Option<Product>> {
    let doc = store.read(&product_key(id)).await?;
    Ok(doc.map(|d| normalize_product(id, &d.value, currency)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_catalog_sorted_by_id() {
        let docs = parse_catalog(json!([
            {"id": "tee", "name": "Tee", "price": 20, "stock": 3},
            {"id": "mug", "name": "Mug", "price": 12, "stock": 5}
        ]))
        .unwrap();

        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["mug", "tee"]);
        assert_eq!(docs[1].1["stock"], json!(3));
    }

    #[test]
    fn test_keyed_catalog() {
        let docs = parse_catalog(json!({"mug": {"name": "Mug", "stock": 5}})).unwrap();
        assert_eq!(docs[0].0, ProductId::new("mug"));
    }

    #[test]
    fn test_entry_without_id_rejected() {
        let err = parse_catalog(json!([{"name": "Nameless"}])).unwrap_err();
        assert!(err.to_string().contains("entry 0"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(parse_catalog(json!([{"id": "a"}, {"id": "a"}])).is_err());
    }

    #[tokio::test]
    async fn test_seeded_products_read_back_normalized() {
        let store = MemoryStore::new();
        let docs = parse_catalog(json!([{"id": "mug", "name": "Mug", "price": "12.5", "stock": -2}]))
            .unwrap();
        seed_store(&store, docs).await;

        let product = read_product(&store, &ProductId::new("mug"), Currency::USD)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(product.name, "Mug");
    }
}
