//! Commerce error types.

use thiserror::Error;

use crate::cart::LineId;
use crate::ids::{ExtraId, ProductId, VariantId};

/// Local cart mutation failures.
///
/// These never corrupt the cart: the operation is rejected and the cart is
/// left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Nothing left in the stock pool for this product/variant.
    #[error("Out of stock: {product_id}{}", variant_suffix(.variant_id))]
    OutOfStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
    },

    /// Requested quantity is not positive.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Product not present in the catalog snapshot.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Variant not offered by the product.
    #[error("Variant not found: {product_id}/{variant_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },

    /// Extra not offered by the product.
    #[error("Extra not found: {product_id}/{extra_id}")]
    ExtraNotFound {
        product_id: ProductId,
        extra_id: ExtraId,
    },

    /// Extra variant not offered by the extra.
    #[error("Extra variant not found: {product_id}/{extra_id}/{variant_id}")]
    ExtraVariantNotFound {
        product_id: ProductId,
        extra_id: ExtraId,
        variant_id: VariantId,
    },

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    LineNotFound(LineId),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in cart calculation")]
    Overflow,
}

/// Checkout transaction outcomes other than success.
///
/// Every variant means no stock was decremented anywhere.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Product vanished between add-to-cart and checkout.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Variant vanished between add-to-cart and checkout.
    #[error("Variant not found: {product_id}/{variant_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },

    /// Extra vanished between add-to-cart and checkout.
    #[error("Extra not found: {product_id}/{extra_id}")]
    ExtraNotFound {
        product_id: ProductId,
        extra_id: ExtraId,
    },

    /// Extra variant vanished between add-to-cart and checkout.
    #[error("Extra variant not found: {product_id}/{extra_id}/{variant_id}")]
    ExtraVariantNotFound {
        product_id: ProductId,
        extra_id: ExtraId,
        variant_id: VariantId,
    },

    /// A product, variant or extra-variant pool cannot cover the cart.
    ///
    /// `extra_id` is set when the pool is an extra's variant, in which case
    /// `variant_id` names that extra variant.
    #[error(
        "Insufficient stock for {product_id}{}: requested {requested}, available {available}",
        variant_suffix(.variant_id)
    )]
    InsufficientStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        extra_id: Option<ExtraId>,
        available: i64,
        requested: i64,
    },

    /// An extra with tracked stock cannot cover the cart.
    #[error(
        "Insufficient stock for extra {extra_id} on {product_id}: requested {requested}, available {available}"
    )]
    InsufficientExtraStock {
        product_id: ProductId,
        extra_id: ExtraId,
        available: i64,
        requested: i64,
    },

    /// Lost every optimistic retry to concurrent writers. Safe to retry.
    #[error("Checkout conflicted with concurrent purchases after {attempts} attempts")]
    TransactionConflict { attempts: u32 },
}

/// Errors that can occur in session-level commerce operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Checkout requested on a cart with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Product id already taken.
    #[error("Product already exists: {0}")]
    ProductExists(ProductId),

    /// SKU allocation lost every retry.
    #[error("SKU allocation conflicted after {attempts} attempts")]
    AllocationConflict { attempts: u32 },

    /// The SKU counter has no value left to hand out.
    #[error("SKU counter exhausted at {0}")]
    SkuExhausted(u64),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] shelf_store::StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn variant_suffix(variant_id: &Option<VariantId>) -> String {
    match variant_id {
        Some(v) => format!("/{}", v),
        None => String::new(),
    }
}
