//! Checkout.
//!
//! The only authoritative stock guard: canonical records are read, every
//! line is validated, and all decrements commit together or not at all.

mod transaction;
mod validate;

pub use transaction::{execute, CheckoutReceipt};
pub use validate::{validate, Decrement, StockPlan};
