//! Cart pricing calculations.

use serde::{Deserialize, Serialize};

use crate::cart::{CartLine, LineId};
use crate::error::CartError;
use crate::money::{Currency, Money};

/// Complete pricing breakdown for a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartPricing {
    /// Sum of unit price times quantity, before extras.
    pub subtotal: Money,
    /// Sum of every line's extras.
    pub extras_total: Money,
    /// Final total (subtotal + extras).
    pub total: Money,
    /// Per-line breakdown, in cart order.
    pub lines: Vec<LinePricing>,
}

impl CartPricing {
    /// Price every line. Fails on overflow or a line in another currency.
    pub fn calculate(lines: &[CartLine], currency: Currency) -> Result<Self, CartError> {
        let lines = lines
            .iter()
            .map(LinePricing::for_line)
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal =
            Money::try_sum(lines.iter().map(|l| &l.subtotal), currency).ok_or(CartError::Overflow)?;
        let extras_total =
            Money::try_sum(lines.iter().map(|l| &l.extras), currency).ok_or(CartError::Overflow)?;
        let total = subtotal.try_add(&extras_total).ok_or(CartError::Overflow)?;

        Ok(Self {
            subtotal,
            extras_total,
            total,
            lines,
        })
    }
}

/// Pricing breakdown for a single line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinePricing {
    pub line_id: LineId,
    pub unit_price: Money,
    pub quantity: i64,
    /// unit_price * quantity
    pub subtotal: Money,
    /// Each extra's unit price times its quantity, times the line quantity.
    pub extras: Money,
    pub total: Money,
}

impl LinePricing {
    pub fn for_line(line: &CartLine) -> Result<Self, CartError> {
        let currency = line.unit_price.currency;
        let subtotal = line
            .unit_price
            .try_multiply(line.quantity)
            .ok_or(CartError::Overflow)?;

        let per_unit = line.extras.iter().try_fold(Money::zero(currency), |acc, extra| {
            extra
                .unit_price
                .try_multiply(extra.quantity)
                .and_then(|m| acc.try_add(&m))
        });
        let extras = per_unit
            .and_then(|m| m.try_multiply(line.quantity))
            .ok_or(CartError::Overflow)?;
        let total = subtotal.try_add(&extras).ok_or(CartError::Overflow)?;

        Ok(Self {
            line_id: line.id.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal,
            extras,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CustomFields, LineExtra};
    use crate::identity::Identity;
    use chrono::Utc;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn line(quantity: i64, unit: i64, extras: Vec<LineExtra>) -> CartLine {
        CartLine {
            id: LineId::new(format!("l{}", unit)),
            product_id: "p".into(),
            product_name: "P".to_string(),
            variant_id: None,
            variant_name: None,
            quantity,
            unit_price: usd(unit),
            extras,
            custom_fields: CustomFields::new(),
            owner: Identity::guest("g"),
            added_at: Utc::now(),
        }
    }

    fn extra(quantity: i64, unit: i64) -> LineExtra {
        LineExtra {
            extra_id: "e".into(),
            name: "E".to_string(),
            variant_id: None,
            variant_name: None,
            quantity,
            value: None,
            unit_price: usd(unit),
        }
    }

    #[test]
    fn test_extras_scale_with_line_quantity() {
        let pricing = LinePricing::for_line(&line(3, 1000, vec![extra(2, 150), extra(1, 50)])).unwrap();
        assert_eq!(pricing.subtotal, usd(3000));
        assert_eq!(pricing.extras, usd(3 * (300 + 50)));
        assert_eq!(pricing.total, usd(4050));
    }

    #[test]
    fn test_cart_pricing_totals() {
        let lines = vec![line(2, 1000, vec![extra(1, 100)]), line(1, 500, vec![])];
        let pricing = CartPricing::calculate(&lines, Currency::USD).unwrap();
        assert_eq!(pricing.subtotal, usd(2500));
        assert_eq!(pricing.extras_total, usd(200));
        assert_eq!(pricing.total, usd(2700));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let lines = vec![line(i64::MAX, 2, vec![])];
        assert_eq!(
            CartPricing::calculate(&lines, Currency::USD),
            Err(CartError::Overflow)
        );
    }
}
