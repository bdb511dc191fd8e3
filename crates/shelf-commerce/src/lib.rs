//! Cart-to-checkout inventory transaction engine for Shelf.
//!
//! - **Catalog**: products with variant and extra stock pools, normalized
//!   once at the store boundary
//! - **Cart**: composite-keyed lines admitted against the last known stock
//! - **Reconciliation**: which cart wins when a guest signs in or a user
//!   signs out
//! - **Checkout**: all-or-nothing stock decrement across every line, retried
//!   on concurrent writes
//! - **SKU allocation**: sequential SKUs that stay unique under concurrency
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_commerce::prelude::*;
//! use shelf_store::{Cache, MemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut session = CartSession::open(
//!     Identity::new_guest(),
//!     store,
//!     Cache::in_memory(),
//!     CommerceConfig::default(),
//! )
//! .await?;
//!
//! session.add(LineRequest::new("mug", 2))?;
//! let receipt = session.checkout().await?;
//! println!("Bought {} units", receipt.units());
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod flush;
pub mod identity;
pub mod persistence;
pub mod reconcile;
pub mod session;
pub mod sku;

pub use config::CommerceConfig;
pub use error::{CartError, CheckoutError, CommerceError};
pub use ids::*;
pub use money::{Currency, Money};
pub use session::CartSession;
pub use sku::SkuAllocator;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::CommerceConfig;
    pub use crate::error::{CartError, CheckoutError, CommerceError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{Catalog, Extra, PoolKey, Product, ProductVariant, StockPool};

    // Cart
    pub use crate::cart::{
        Admission, Cart, CartLine, CartPricing, ExtraSelection, LineId, LineRequest,
        QuantityChange,
    };

    // Identity and persistence
    pub use crate::identity::{Identity, IdentityTransition};
    pub use crate::persistence::{CartPersistence, StoredCart};
    pub use crate::reconcile::Outcome;

    // Checkout and allocation
    pub use crate::checkout::CheckoutReceipt;
    pub use crate::session::CartSession;
    pub use crate::sku::SkuAllocator;
}
