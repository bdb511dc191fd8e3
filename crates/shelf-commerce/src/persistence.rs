//! Cart persistence.
//!
//! Carts live in two places: a client-local key-value cache keyed by
//! identity (instant reads, and the only home of guest carts) and the
//! durable remote store keyed by user id. Both hold the same
//! [`StoredCart`] shape. Writes are last-write-wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{cache_key, Cache, DocumentKey, DocumentStore, StoreResult, WriteBatch};
use tracing::{debug, warn};

use crate::cart::{Cart, CartLine};
use crate::identity::Identity;
use crate::ids::UserId;
use crate::money::Currency;

/// Collection holding durable user carts.
pub const CARTS: &str = "carts";

/// Persisted cart shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCart {
    #[serde(default)]
    pub items: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl StoredCart {
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            items: cart.lines.clone(),
            updated_at: cart.updated_at,
        }
    }

    /// Rebuild a cart for `owner`.
    pub fn into_cart(self, owner: Identity, currency: Currency) -> Cart {
        let mut cart = Cart::with_lines(owner, currency, self.items);
        cart.updated_at = self.updated_at;
        cart
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Store key of a user's durable cart.
pub fn remote_key(user_id: &UserId) -> DocumentKey {
    DocumentKey::new(CARTS, user_id.as_str())
}

/// Cache key of an identity's local cart, e.g. `cart:user:ada`.
pub fn local_key(identity: &Identity) -> String {
    cache_key!("cart", identity)
}

/// Reads and writes carts in the local cache and the remote store.
#[derive(Clone)]
pub struct CartPersistence {
    remote: Arc<dyn DocumentStore>,
    local: Cache,
}

impl CartPersistence {
    pub fn new(remote: Arc<dyn DocumentStore>, local: Cache) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &Cache {
        &self.local
    }

    /// Read the local copy. A corrupt entry reads as missing.
    pub fn load_local(&self, identity: &Identity) -> StoreResult<Option<StoredCart>> {
        match self.local.get::<StoredCart>(&local_key(identity)) {
            Ok(cart) => Ok(cart),
            Err(shelf_store::StoreError::Serialization(e)) => {
                warn!(identity = %identity, error = %e, "Discarding unreadable local cart");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn save_local(&self, cart: &Cart) -> StoreResult<()> {
        self.local
            .set(&local_key(&cart.owner), &StoredCart::from_cart(cart))
    }

    /// Drop the local copy without touching the remote cart.
    pub fn clear_local(&self, identity: &Identity) -> StoreResult<()> {
        self.local.delete(&local_key(identity))
    }

    pub async fn load_remote(&self, user_id: &UserId) -> StoreResult<Option<StoredCart>> {
        match self.remote.read(&remote_key(user_id)).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the remote cart unconditionally.
    pub async fn save_remote(&self, user_id: &UserId, cart: &StoredCart) -> StoreResult<()> {
        let value = serde_json::to_value(cart)?;
        self.remote
            .commit(WriteBatch::new().put(remote_key(user_id), value))
            .await
    }

    /// Write the cart everywhere its owner keeps one: locally always, and
    /// remotely for signed-in users.
    pub async fn flush(&self, cart: &Cart) -> StoreResult<()> {
        self.save_local(cart)?;
        if let Identity::User(user_id) = &cart.owner {
            self.save_remote(user_id, &StoredCart::from_cart(cart)).await?;
        }
        debug!(owner = %cart.owner, lines = cart.len(), "Cart flushed");
        Ok(())
    }
}
