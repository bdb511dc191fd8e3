//! Cart and cart line types.
//!
//! The cart enforces the stock-sharing rule locally: for every
//! product/variant pool, the quantities of all lines drawing on it never
//! exceed the pool's last known stock. Admission is advisory. Checkout is
//! the authoritative guard.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartPricing, CustomFields, ExtraSelection, LineId};
use crate::catalog::{Catalog, PoolKey, Product};
use crate::error::CartError;
use crate::identity::Identity;
use crate::ids::{ExtraId, ProductId, VariantId};
use crate::money::{Currency, Money};

/// A request to put something in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub variant_id: Option<VariantId>,
    pub extras: Vec<ExtraSelection>,
    pub custom_fields: CustomFields,
}

impl LineRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            variant_id: None,
            extras: Vec::new(),
            custom_fields: CustomFields::new(),
        }
    }

    pub fn variant(mut self, variant_id: impl Into<VariantId>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn extra(mut self, extra: ExtraSelection) -> Self {
        self.extras.push(extra);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.insert(name.into(), value.into());
        self
    }

    /// The line this request merges into.
    pub fn line_id(&self) -> LineId {
        LineId::compose(
            &self.product_id,
            self.variant_id.as_ref(),
            &self.extras,
            &self.custom_fields,
        )
    }
}

/// How much of an add request made it into the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Everything requested was added.
    Full { line_id: LineId, quantity: i64 },
    /// The pool ran short; only `admitted` units were added.
    Partial {
        line_id: LineId,
        requested: i64,
        admitted: i64,
    },
}

impl Admission {
    pub fn line_id(&self) -> &LineId {
        match self {
            Admission::Full { line_id, .. } | Admission::Partial { line_id, .. } => line_id,
        }
    }

    pub fn admitted(&self) -> i64 {
        match self {
            Admission::Full { quantity, .. } => *quantity,
            Admission::Partial { admitted, .. } => *admitted,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Admission::Partial { .. })
    }
}

/// Outcome of a quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Quantity was zero or less; the line is gone.
    Removed,
    Updated { quantity: i64 },
    /// The pool could not cover the request; the line holds `applied`.
    Clamped { requested: i64, applied: i64 },
}

/// A shopping cart owned by exactly one identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub owner: Identity,
    pub lines: Vec<CartLine>,
    pub currency: Currency,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(owner: Identity, currency: Currency) -> Self {
        Self {
            owner,
            lines: Vec::new(),
            currency,
            updated_at: Utc::now(),
        }
    }

    /// Build a cart around lines loaded from storage.
    pub fn with_lines(owner: Identity, currency: Currency, lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new(owner, currency);
        cart.lines = lines;
        cart
    }

    /// Add a selection, merging into an existing line with the same key.
    ///
    /// Admits at most what is left in the pool after every line already
    /// drawing on it. Fails without touching the cart when nothing is left or
    /// the selection does not match the catalog.
    pub fn add_line(&mut self, catalog: &Catalog, request: LineRequest) -> Result<Admission, CartError> {
        if request.quantity <= 0 {
            return Err(CartError::InvalidQuantity(request.quantity));
        }

        let product = catalog
            .get(&request.product_id)
            .ok_or_else(|| CartError::ProductNotFound(request.product_id.clone()))?;

        let variant_name = match &request.variant_id {
            Some(variant_id) => Some(
                product
                    .variant(variant_id)
                    .map(|v| v.name.clone())
                    .ok_or_else(|| CartError::VariantNotFound {
                        product_id: product.id.clone(),
                        variant_id: variant_id.clone(),
                    })?,
            ),
            None => None,
        };
        let extras = resolve_extras(product, &request.extras)?;

        let pool = PoolKey::for_line(&product.id, request.variant_id.as_ref());
        let stock = product
            .pool_stock(request.variant_id.as_ref())
            .unwrap_or_default();
        let remaining = stock.saturating_sub(self.committed_to_pool(&pool, None));
        if remaining <= 0 {
            return Err(CartError::OutOfStock {
                product_id: product.id.clone(),
                variant_id: request.variant_id.clone(),
            });
        }
        let admitted = request.quantity.min(remaining);

        let line_id = request.line_id();
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == line_id) {
            line.quantity = line
                .quantity
                .checked_add(admitted)
                .ok_or(CartError::Overflow)?;
        } else {
            let unit_price = product
                .unit_price(request.variant_id.as_ref())
                .unwrap_or(product.price);
            self.lines.push(CartLine {
                id: line_id.clone(),
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                variant_id: request.variant_id,
                variant_name,
                quantity: admitted,
                unit_price,
                extras,
                custom_fields: request.custom_fields,
                owner: self.owner.clone(),
                added_at: Utc::now(),
            });
        }
        self.touch();

        debug!(
            line_id = %line_id,
            pool = %pool,
            requested = request.quantity,
            admitted,
            "Admitted cart line"
        );

        Ok(if admitted < request.quantity {
            Admission::Partial {
                line_id,
                requested: request.quantity,
                admitted,
            }
        } else {
            Admission::Full {
                line_id,
                quantity: admitted,
            }
        })
    }

    /// Set a line's quantity, clamped to what its pool can still cover.
    ///
    /// A quantity of zero or less removes the line.
    pub fn update_line_quantity(
        &mut self,
        catalog: &Catalog,
        line_id: &LineId,
        quantity: i64,
    ) -> Result<QuantityChange, CartError> {
        let line = self
            .line(line_id)
            .ok_or_else(|| CartError::LineNotFound(line_id.clone()))?;

        if quantity <= 0 {
            self.remove_line(line_id);
            return Ok(QuantityChange::Removed);
        }

        let product = catalog
            .get(&line.product_id)
            .ok_or_else(|| CartError::ProductNotFound(line.product_id.clone()))?;
        let stock = match &line.variant_id {
            Some(variant_id) => product
                .variant(variant_id)
                .map(|v| v.stock)
                .ok_or_else(|| CartError::VariantNotFound {
                    product_id: line.product_id.clone(),
                    variant_id: variant_id.clone(),
                })?,
            None => product.stock,
        };

        let pool = PoolKey::for_line(&line.product_id, line.variant_id.as_ref());
        let remaining = stock.saturating_sub(self.committed_to_pool(&pool, Some(line_id)));
        if remaining <= 0 {
            return Err(CartError::OutOfStock {
                product_id: line.product_id.clone(),
                variant_id: line.variant_id.clone(),
            });
        }
        let applied = quantity.min(remaining);

        if let Some(line) = self.lines.iter_mut().find(|l| &l.id == line_id) {
            line.quantity = applied;
        }
        self.touch();

        Ok(if applied < quantity {
            QuantityChange::Clamped {
                requested: quantity,
                applied,
            }
        } else {
            QuantityChange::Updated { quantity: applied }
        })
    }

    /// Remove a line. Returns it if it was present.
    pub fn remove_line(&mut self, line_id: &LineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| &l.id == line_id)?;
        let line = self.lines.remove(index);
        self.touch();
        Some(line)
    }

    /// Clear all lines from the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    /// Sum of line quantities.
    pub fn count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Grand total including extras.
    pub fn total(&self) -> Result<Money, CartError> {
        Ok(self.pricing()?.total)
    }

    /// Per-line pricing breakdown.
    pub fn pricing(&self) -> Result<CartPricing, CartError> {
        CartPricing::calculate(&self.lines, self.currency)
    }

    /// Units already held by lines drawing on `pool`, optionally skipping one
    /// line.
    pub fn committed_to_pool(&self, pool: &PoolKey, exclude: Option<&LineId>) -> i64 {
        self.lines
            .iter()
            .filter(|l| Some(&l.id) != exclude && &l.pool() == pool)
            .fold(0_i64, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Hand the cart and every line over to a new owner.
    pub fn retag_owner(&mut self, owner: Identity) {
        for line in &mut self.lines {
            line.owner = owner.clone();
        }
        self.owner = owner;
        self.touch();
    }

    pub fn line(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.id == line_id)
    }

    /// Distinct products referenced by the cart.
    pub fn product_ids(&self) -> BTreeSet<ProductId> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Composite key.
    pub id: LineId,
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub product_name: String,
    pub variant_id: Option<VariantId>,
    pub variant_name: Option<String>,
    pub quantity: i64,
    /// Price captured when the line was created.
    pub unit_price: Money,
    #[serde(default)]
    pub extras: Vec<LineExtra>,
    #[serde(default)]
    pub custom_fields: CustomFields,
    /// Identity the line was added under.
    pub owner: Identity,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// The product/variant pool this line draws on.
    pub fn pool(&self) -> PoolKey {
        PoolKey::for_line(&self.product_id, self.variant_id.as_ref())
    }
}

/// An extra attached to a cart line, with its price captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineExtra {
    pub extra_id: ExtraId,
    pub name: String,
    pub variant_id: Option<VariantId>,
    pub variant_name: Option<String>,
    /// Units per unit of the line.
    pub quantity: i64,
    pub value: Option<String>,
    /// Price per unit of the extra.
    pub unit_price: Money,
}

fn resolve_extras(product: &Product, picks: &[ExtraSelection]) -> Result<Vec<LineExtra>, CartError> {
    let zero = Money::zero(product.price.currency);
    picks
        .iter()
        .map(|pick| {
            if pick.quantity <= 0 {
                return Err(CartError::InvalidQuantity(pick.quantity));
            }
            let extra = product
                .extra(&pick.extra_id)
                .ok_or_else(|| CartError::ExtraNotFound {
                    product_id: product.id.clone(),
                    extra_id: pick.extra_id.clone(),
                })?;
            let variant_name = match &pick.variant_id {
                Some(variant_id) => Some(
                    extra
                        .variant(variant_id)
                        .map(|v| v.name.clone())
                        .ok_or_else(|| CartError::ExtraVariantNotFound {
                            product_id: product.id.clone(),
                            extra_id: extra.id.clone(),
                            variant_id: variant_id.clone(),
                        })?,
                ),
                None => None,
            };
            Ok(LineExtra {
                extra_id: extra.id.clone(),
                name: extra.name.clone(),
                variant_id: pick.variant_id.clone(),
                variant_name,
                quantity: pick.quantity,
                value: pick.value.clone(),
                unit_price: extra.unit_price(pick.variant_id.as_ref()).unwrap_or(zero),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Extra, ProductVariant};

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn catalog() -> Catalog {
        Catalog::from_products(
            Currency::USD,
            [
                Product::new("mug", "Mug", usd(1000)).with_stock(5),
                Product::new("tee", "Tee", usd(2000))
                    .with_stock(99)
                    .with_variant(ProductVariant::new("s", "Small", 2))
                    .with_variant(ProductVariant::new("xl", "XL", 4).with_price(usd(2500)))
                    .with_extra(
                        Extra::new("wrap", "Gift wrap")
                            .with_price(usd(300))
                            .with_variant(ProductVariant::new("gold", "Gold", 1).with_price(usd(500))),
                    ),
                Product::new("sold-out", "Sold out", usd(100)),
            ],
        )
    }

    fn cart() -> Cart {
        Cart::new(Identity::guest("g1"), Currency::USD)
    }

    #[test]
    fn test_extra_values_with_separators_stay_on_separate_lines() {
        let catalog = Catalog::from_products(
            Currency::USD,
            [Product::new("card", "Card", usd(300))
                .with_stock(10)
                .with_extra(Extra::new("note", "Note"))
                .with_extra(Extra::new("stamp", "Stamp").with_price(usd(50)))],
        );
        let mut cart = cart();

        cart.add_line(
            &catalog,
            LineRequest::new("card", 1).extra(ExtraSelection::new("note", 1).with_value("hi|stamp:-:1:")),
        )
        .unwrap();
        cart.add_line(
            &catalog,
            LineRequest::new("card", 1)
                .extra(ExtraSelection::new("note", 1).with_value("hi"))
                .extra(ExtraSelection::new("stamp", 1)),
        )
        .unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.lines[0].extras.len(), 1);
        assert_eq!(cart.lines[1].extras.len(), 2);
    }

    #[test]
    fn test_add_then_partial_admission() {
        let catalog = catalog();
        let mut cart = cart();

        let first = cart.add_line(&catalog, LineRequest::new("mug", 3)).unwrap();
        assert_eq!(first.admitted(), 3);
        assert!(!first.is_partial());

        let second = cart.add_line(&catalog, LineRequest::new("mug", 3)).unwrap();
        assert_eq!(
            second,
            Admission::Partial {
                line_id: first.line_id().clone(),
                requested: 3,
                admitted: 2
            }
        );
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.count(), 5);

        let third = cart.add_line(&catalog, LineRequest::new("mug", 1));
        assert!(matches!(third, Err(CartError::OutOfStock { .. })));
        assert_eq!(cart.count(), 5);
    }

    #[test]
    fn test_distinct_lines_share_pool() {
        let catalog = catalog();
        let mut cart = cart();

        cart.add_line(&catalog, LineRequest::new("mug", 2).field("engraving", "A"))
            .unwrap();
        let other = cart
            .add_line(&catalog, LineRequest::new("mug", 5).field("engraving", "B"))
            .unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(other.admitted(), 3);
        assert_eq!(cart.committed_to_pool(&PoolKey::for_line(&"mug".into(), None), None), 5);
    }

    #[test]
    fn test_variant_price_captured() {
        let catalog = catalog();
        let mut cart = cart();

        let admission = cart
            .add_line(&catalog, LineRequest::new("tee", 1).variant("xl"))
            .unwrap();
        let line = cart.line(admission.line_id()).unwrap();
        assert_eq!(line.unit_price, usd(2500));
        assert_eq!(line.variant_name.as_deref(), Some("XL"));
        assert_eq!(line.owner, Identity::guest("g1"));
    }

    #[test]
    fn test_variant_product_without_variant_uses_base_pool() {
        let catalog = catalog();
        let mut cart = cart();
        let admission = cart.add_line(&catalog, LineRequest::new("tee", 1)).unwrap();
        assert_eq!(cart.line(admission.line_id()).unwrap().unit_price, usd(2000));
    }

    #[test]
    fn test_rejections_leave_cart_untouched() {
        let catalog = catalog();
        let mut cart = cart();
        cart.add_line(&catalog, LineRequest::new("mug", 1)).unwrap();
        let before = cart.lines.clone();

        let cases = [
            (LineRequest::new("mug", 0), CartError::InvalidQuantity(0)),
            (
                LineRequest::new("ghost", 1),
                CartError::ProductNotFound("ghost".into()),
            ),
            (
                LineRequest::new("tee", 1).variant("m"),
                CartError::VariantNotFound {
                    product_id: "tee".into(),
                    variant_id: "m".into(),
                },
            ),
            (
                LineRequest::new("tee", 1).extra(ExtraSelection::new("bow", 1)),
                CartError::ExtraNotFound {
                    product_id: "tee".into(),
                    extra_id: "bow".into(),
                },
            ),
            (
                LineRequest::new("tee", 1).extra(ExtraSelection::new("wrap", 1).with_variant("silver")),
                CartError::ExtraVariantNotFound {
                    product_id: "tee".into(),
                    extra_id: "wrap".into(),
                    variant_id: "silver".into(),
                },
            ),
            (
                LineRequest::new("sold-out", 1),
                CartError::OutOfStock {
                    product_id: "sold-out".into(),
                    variant_id: None,
                },
            ),
        ];

        for (request, expected) in cases {
            assert_eq!(cart.add_line(&catalog, request), Err(expected));
            assert_eq!(cart.lines, before);
        }
    }

    #[test]
    fn test_update_quantity_clamps_excluding_own_line() {
        let catalog = catalog();
        let mut cart = cart();
        let a = cart
            .add_line(&catalog, LineRequest::new("tee", 1).variant("xl"))
            .unwrap();
        cart.add_line(
            &catalog,
            LineRequest::new("tee", 1)
                .variant("xl")
                .extra(ExtraSelection::new("wrap", 1)),
        )
        .unwrap();

        let change = cart
            .update_line_quantity(&catalog, a.line_id(), 10)
            .unwrap();
        assert_eq!(
            change,
            QuantityChange::Clamped {
                requested: 10,
                applied: 3
            }
        );
        assert_eq!(cart.count(), 4);

        let change = cart.update_line_quantity(&catalog, a.line_id(), 2).unwrap();
        assert_eq!(change, QuantityChange::Updated { quantity: 2 });
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let catalog = catalog();
        let mut cart = cart();
        let a = cart.add_line(&catalog, LineRequest::new("mug", 2)).unwrap();

        assert_eq!(
            cart.update_line_quantity(&catalog, a.line_id(), 0),
            Ok(QuantityChange::Removed)
        );
        assert!(cart.is_empty());
        assert_eq!(
            cart.update_line_quantity(&catalog, a.line_id(), 1),
            Err(CartError::LineNotFound(a.line_id().clone()))
        );
    }

    #[test]
    fn test_update_quantity_out_of_stock_keeps_line() {
        let mut catalog = catalog();
        let mut cart = cart();
        let a = cart.add_line(&catalog, LineRequest::new("mug", 2)).unwrap();

        catalog.insert(Product::new("mug", "Mug", usd(1000)));
        let result = cart.update_line_quantity(&catalog, a.line_id(), 3);
        assert!(matches!(result, Err(CartError::OutOfStock { .. })));
        assert_eq!(cart.count(), 2);
    }

    #[test]
    fn test_total_includes_extras_per_line_unit() {
        let catalog = catalog();
        let mut cart = cart();
        cart.add_line(
            &catalog,
            LineRequest::new("tee", 2)
                .variant("s")
                .extra(ExtraSelection::new("wrap", 1).with_variant("gold")),
        )
        .unwrap();
        cart.add_line(&catalog, LineRequest::new("mug", 1)).unwrap();

        // 2 * 20.00 + 2 * 1 * 5.00 + 1 * 10.00
        assert_eq!(cart.total().unwrap(), usd(6000));
        assert_eq!(cart.count(), 3);
    }

    #[test]
    fn test_retag_owner() {
        let catalog = catalog();
        let mut cart = cart();
        cart.add_line(&catalog, LineRequest::new("mug", 1)).unwrap();

        cart.retag_owner(Identity::user("ada"));
        assert_eq!(cart.owner, Identity::user("ada"));
        assert!(cart.lines.iter().all(|l| l.owner == Identity::user("ada")));
    }
}
