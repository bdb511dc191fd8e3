//! Shopping cart module.
//!
//! Contains the cart line store, composite line keys and pricing.

mod cart;
mod key;
mod pricing;

pub use cart::{Admission, Cart, CartLine, LineExtra, LineRequest, QuantityChange};
pub use key::{CustomFields, ExtraSelection, LineId};
pub use pricing::{CartPricing, LinePricing};
