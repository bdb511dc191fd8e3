//! Conversion between stored product documents and [`Product`].
//!
//! Stored records are loosely typed: numbers may be missing, `null`, strings
//! or floats, and arrays may be absent. Everything is normalized here, once,
//! so the rest of the crate can rely on well-typed products:
//!
//! - missing or malformed counts become `0`, negative counts become `0`
//! - missing arrays become empty, non-object entries are skipped
//! - an extra's `stock` that is missing or `null` means unlimited
//! - a variant's `price` that is missing means "use the parent's price"
//!
//! Prices are stored as decimal major units (`19.99`) and become [`Money`].

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::catalog::{Extra, Product, ProductVariant};
use crate::ids::{ExtraId, ProductId, Sku, VariantId};
use crate::money::{Currency, Money};

/// Normalize a stored product document.
///
/// `id` is the document key's id and wins over any `id` field in the body.
pub fn normalize_product(id: &ProductId, raw: &Value, currency: Currency) -> Product {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    Product {
        id: id.clone(),
        name: text(obj, "name"),
        price: price(obj, "price", currency).unwrap_or_else(|| Money::zero(currency)),
        stock: count(obj, "stock"),
        sku: obj.get("sku").and_then(number).and_then(|n| {
            if n >= 1.0 {
                Some(Sku::new(n as u64))
            } else {
                None
            }
        }),
        variants: entries(obj, "variants")
            .map(|(i, v)| normalize_variant(i, v, currency))
            .collect(),
        extras: entries(obj, "extras")
            .map(|(i, e)| normalize_extra(i, e, currency))
            .collect(),
        updated_at: obj
            .get("updatedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

fn normalize_variant(index: usize, obj: &Map<String, Value>, currency: Currency) -> ProductVariant {
    ProductVariant {
        id: VariantId::new(entry_id(obj, index)),
        name: text(obj, "name"),
        price: price(obj, "price", currency),
        stock: count(obj, "stock"),
    }
}

fn normalize_extra(index: usize, obj: &Map<String, Value>, currency: Currency) -> Extra {
    Extra {
        id: ExtraId::new(entry_id(obj, index)),
        name: text(obj, "name"),
        price: price(obj, "price", currency),
        stock: match obj.get("stock") {
            None | Some(Value::Null) => None,
            Some(v) => Some(clamp_count(number(v))),
        },
        variants: entries(obj, "variants")
            .map(|(i, v)| normalize_variant(i, v, currency))
            .collect(),
    }
}

/// Render a product as a store document.
pub fn product_document(product: &Product) -> Value {
    let mut doc = json!({
        "id": product.id.as_str(),
        "name": product.name,
        "price": product.price.to_decimal(),
        "stock": product.stock,
        "variants": product.variants.iter().map(variant_document).collect::<Vec<_>>(),
        "extras": product.extras.iter().map(|e| json!({
            "id": e.id.as_str(),
            "name": e.name,
            "price": e.price.map(|p| p.to_decimal()),
            "stock": e.stock,
            "variants": e.variants.iter().map(variant_document).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    });
    if let Some(obj) = doc.as_object_mut() {
        if let Some(sku) = product.sku {
            obj.insert("sku".to_string(), json!(sku.get()));
        }
        if let Some(at) = product.updated_at {
            obj.insert("updatedAt".to_string(), json!(timestamp(at)));
        }
    }
    doc
}

fn variant_document(v: &ProductVariant) -> Value {
    let mut doc = json!({
        "id": v.id.as_str(),
        "name": v.name,
        "stock": v.stock,
    });
    if let (Some(obj), Some(price)) = (doc.as_object_mut(), v.price) {
        obj.insert("price".to_string(), json!(price.to_decimal()));
    }
    doc
}

/// New stock values for one product record, keyed the same way the
/// normalized [`Product`] is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StockWrite {
    pub base: Option<i64>,
    pub variants: BTreeMap<VariantId, i64>,
    pub extras: BTreeMap<ExtraId, i64>,
    pub extra_variants: BTreeMap<(ExtraId, VariantId), i64>,
}

/// Patch stock fields in a raw document in place, leaving every other field
/// untouched, and stamp `updatedAt`.
pub(crate) fn write_stock(doc: &mut Value, write: &StockWrite, now: DateTime<Utc>) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let Some(obj) = doc.as_object_mut() else {
        return;
    };

    if let Some(base) = write.base {
        obj.insert("stock".to_string(), json!(base));
    }

    if !write.variants.is_empty() {
        for_each_entry_mut(obj, "variants", |id, variant| {
            if let Some(stock) = write.variants.get(&VariantId::new(id)) {
                variant.insert("stock".to_string(), json!(stock));
            }
        });
    }

    if !write.extras.is_empty() || !write.extra_variants.is_empty() {
        for_each_entry_mut(obj, "extras", |extra_id, extra| {
            let extra_id = ExtraId::new(extra_id);
            if let Some(stock) = write.extras.get(&extra_id) {
                extra.insert("stock".to_string(), json!(stock));
            }
            for_each_entry_mut(extra, "variants", |variant_id, variant| {
                let key = (extra_id.clone(), VariantId::new(variant_id));
                if let Some(stock) = write.extra_variants.get(&key) {
                    variant.insert("stock".to_string(), json!(stock));
                }
            });
        });
    }

    obj.insert("updatedAt".to_string(), json!(timestamp(now)));
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Id of an array entry; falls back to its position when the entry has none,
/// so normalization and patching agree on which entry is which.
fn entry_id(obj: &Map<String, Value>, index: usize) -> String {
    match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => index.to_string(),
    }
}

fn entries<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> impl Iterator<Item = (usize, &'a Map<String, Value>)> + 'a {
    obj.get(field)
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

fn for_each_entry_mut<F>(obj: &mut Map<String, Value>, field: &str, mut f: F)
where
    F: FnMut(String, &mut Map<String, Value>),
{
    let Some(items) = obj.get_mut(field).and_then(Value::as_array_mut) else {
        return;
    };
    for (i, item) in items.iter_mut().enumerate() {
        if let Some(entry) = item.as_object_mut() {
            let id = entry_id(entry, i);
            f(id, entry);
        }
    }
}

fn text(obj: &Map<String, Value>, field: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn clamp_count(n: Option<f64>) -> i64 {
    match n {
        Some(n) if n > 0.0 => n.trunc().min(i64::MAX as f64) as i64,
        _ => 0,
    }
}

fn count(obj: &Map<String, Value>, field: &str) -> i64 {
    clamp_count(obj.get(field).and_then(number))
}

fn price(obj: &Map<String, Value>, field: &str, currency: Currency) -> Option<Money> {
    let n = obj.get(field).and_then(number)?;
    Some(Money::from_decimal(n.max(0.0), currency))
}
