//! The cart session aggregate.
//!
//! [`CartSession`] owns everything one shopper's cart needs: the active cart,
//! the catalog snapshot it admits against, the pending-write schedule, and
//! handles to persistence and the checkout executor. It is owned by the
//! caller and passed by reference; there is no global cart.

use std::sync::Arc;

use shelf_store::{Cache, DocumentStore, StoreResult, TxnExecutor};
use tracing::{debug, warn};

use crate::cart::{Admission, Cart, CartLine, LineId, LineRequest, QuantityChange};
use crate::catalog::Catalog;
use crate::checkout::{self, CheckoutReceipt};
use crate::clock::{Clock, SystemClock};
use crate::config::CommerceConfig;
use crate::error::CommerceError;
use crate::flush::PendingWrite;
use crate::identity::{Identity, IdentityTransition};
use crate::persistence::CartPersistence;
use crate::reconcile::{reconcile, Outcome};

/// A snapshot of the cart to write, detached from the session so it can run
/// while the cart keeps changing.
pub struct FlushJob {
    persistence: CartPersistence,
    snapshot: Cart,
}

impl FlushJob {
    pub async fn run(self) -> StoreResult<()> {
        self.persistence.flush(&self.snapshot).await
    }
}

/// One shopper's cart and the services around it.
pub struct CartSession {
    cart: Cart,
    catalog: Catalog,
    pending: PendingWrite,
    persistence: CartPersistence,
    executor: TxnExecutor,
    clock: Arc<dyn Clock>,
    config: CommerceConfig,
    reconciled: Option<Identity>,
}

impl CartSession {
    /// Create a session with an empty cart for `identity`. Nothing is loaded;
    /// see [`CartSession::open`].
    pub fn new(
        identity: Identity,
        store: Arc<dyn DocumentStore>,
        local: Cache,
        config: CommerceConfig,
    ) -> Self {
        let executor = TxnExecutor::new(Arc::clone(&store), config.checkout_policy());
        Self {
            cart: Cart::new(identity, config.currency),
            catalog: Catalog::new(config.currency),
            pending: PendingWrite::new(config.debounce()),
            persistence: CartPersistence::new(store, local),
            executor,
            clock: Arc::new(SystemClock),
            config,
            reconciled: None,
        }
    }

    /// Create a session, load the catalog and restore the stored cart for
    /// `identity`.
    pub async fn open(
        identity: Identity,
        store: Arc<dyn DocumentStore>,
        local: Cache,
        config: CommerceConfig,
    ) -> Result<Self, CommerceError> {
        let mut session = Self::new(identity.clone(), store, local, config);
        session.refresh_catalog().await?;
        session
            .on_identity_change(IdentityTransition::new(None, identity))
            .await?;
        Ok(session)
    }

    /// Replace the time source used for flush scheduling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.cart.owner
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pending(&self) -> &PendingWrite {
        &self.pending
    }

    pub fn config(&self) -> &CommerceConfig {
        &self.config
    }

    pub fn persistence(&self) -> &CartPersistence {
        &self.persistence
    }

    // =========================================================================
    // Cart mutations
    // =========================================================================

    /// Add a selection to the cart.
    pub fn add(&mut self, request: LineRequest) -> Result<Admission, CommerceError> {
        let admission = self.cart.add_line(&self.catalog, request)?;
        self.mutated();
        Ok(admission)
    }

    /// Change a line's quantity. Zero or less removes it.
    pub fn update_quantity(
        &mut self,
        line_id: &LineId,
        quantity: i64,
    ) -> Result<QuantityChange, CommerceError> {
        let change = self
            .cart
            .update_line_quantity(&self.catalog, line_id, quantity)?;
        self.mutated();
        Ok(change)
    }

    pub fn remove(&mut self, line_id: &LineId) -> Option<CartLine> {
        let removed = self.cart.remove_line(line_id);
        if removed.is_some() {
            self.mutated();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.cart.clear();
        self.mutated();
    }

    fn mutated(&mut self) {
        self.pending.mark_dirty(self.clock.now());
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Hand out the scheduled write if its deadline has passed. Report the
    /// result with [`CartSession::complete_flush`].
    pub fn take_due_flush(&mut self) -> Option<FlushJob> {
        if self.pending.begin_if_due(self.clock.now()) {
            Some(self.flush_job())
        } else {
            None
        }
    }

    /// Record how a [`FlushJob`] went. Failures are rescheduled.
    pub fn complete_flush(&mut self, result: &StoreResult<()>) {
        if let Err(e) = result {
            warn!(owner = %self.cart.owner, error = %e, "Cart flush failed, rescheduling");
        }
        self.pending.finish(self.clock.now(), result.is_ok());
    }

    /// Write the cart if the debounce deadline has passed.
    pub async fn flush_if_due(&mut self) -> Result<bool, CommerceError> {
        match self.take_due_flush() {
            Some(job) => self.run_flush(job).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Write the cart now if anything is owed.
    pub async fn flush_now(&mut self) -> Result<bool, CommerceError> {
        if !self.pending.begin_now() {
            return Ok(false);
        }
        let job = self.flush_job();
        self.run_flush(job).await.map(|_| true)
    }

    fn flush_job(&self) -> FlushJob {
        FlushJob {
            persistence: self.persistence.clone(),
            snapshot: self.cart.clone(),
        }
    }

    async fn run_flush(&mut self, job: FlushJob) -> Result<(), CommerceError> {
        let result = job.run().await;
        self.complete_flush(&result);
        result.map_err(Into::into)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// React to a sign-in, sign-out or user switch.
    ///
    /// Runs reconciliation once per identity: repeating a transition to the
    /// identity already reconciled changes nothing. Owed writes for the
    /// outgoing identity are flushed first.
    pub async fn on_identity_change(
        &mut self,
        transition: IdentityTransition,
    ) -> Result<Outcome, CommerceError> {
        if self.reconciled.as_ref() == Some(&transition.new) {
            debug!(identity = %transition.new, "Identity already reconciled");
            return Ok(Outcome::Unchanged);
        }

        self.flush_now().await?;

        let stored = match &transition.new {
            Identity::User(user_id) => self.persistence.load_remote(user_id).await?,
            Identity::Guest(_) => self.persistence.load_local(&transition.new)?,
        };

        let result = reconcile(&transition, &self.cart, stored);

        if result.persist {
            self.persistence.flush(&result.cart).await?;
        }
        match result.outcome {
            // The outgoing identity's local copy is either stale or has moved.
            Outcome::LoggedOut | Outcome::PromotedGuest => {
                if let Some(previous) = &transition.previous {
                    self.persistence.clear_local(previous)?;
                }
            }
            Outcome::AdoptedStored => {
                // A guest signing in gives up its cart for the stored one.
                if let Some(previous @ Identity::Guest(_)) = &transition.previous {
                    self.persistence.clear_local(previous)?;
                }
                self.persistence.save_local(&result.cart)?;
            }
            Outcome::Unchanged | Outcome::StartedEmpty => {}
        }

        self.cart = result.cart;
        self.pending.cancel();
        self.reconciled = Some(transition.new);
        Ok(result.outcome)
    }

    // =========================================================================
    // Catalog and checkout
    // =========================================================================

    /// Reload the catalog snapshot from the canonical store.
    pub async fn refresh_catalog(&mut self) -> Result<(), CommerceError> {
        self.catalog.refresh(self.executor.store().as_ref()).await?;
        Ok(())
    }

    /// Buy everything in the cart.
    ///
    /// On success the cart is cleared and written, and the purchased products
    /// are reloaded into the catalog.
    /// On failure nothing changes, in the store or in the cart.
    pub async fn checkout(&mut self) -> Result<CheckoutReceipt, CommerceError> {
        if self.cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let receipt = checkout::execute(&self.executor, &self.cart.lines, self.cart.currency).await?;

        self.cart.clear();
        self.mutated();
        if let Err(e) = self.flush_now().await {
            warn!(owner = %self.cart.owner, error = %e, "Cart not written after checkout");
        }
        if let Err(e) = self
            .catalog
            .refresh_ids(self.executor.store().as_ref(), &receipt.products)
            .await
        {
            warn!(error = %e, "Catalog not refreshed after checkout");
        }

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{product_document, product_key, Product};
    use crate::clock::ManualClock;
    use crate::flush::FlushState;
    use crate::ids::UserId;
    use crate::money::{Currency, Money};
    use crate::persistence::StoredCart;
    use shelf_store::MemoryStore;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        local: Cache,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            for product in [
                Product::new("mug", "Mug", Money::new(1000, Currency::USD)).with_stock(5),
                Product::new("tee", "Tee", Money::new(2000, Currency::USD)).with_stock(2),
            ] {
                store.put(product_key(&product.id), product_document(&product)).await;
            }
            Self {
                store,
                local: Cache::in_memory(),
                clock: Arc::new(ManualClock::new()),
            }
        }

        async fn open(&self, identity: Identity) -> CartSession {
            CartSession::open(
                identity,
                self.store.clone(),
                self.local.clone(),
                CommerceConfig::default(),
            )
            .await
            .unwrap()
            .with_clock(self.clock.clone())
        }

        fn persistence(&self) -> CartPersistence {
            CartPersistence::new(self.store.clone(), self.local.clone())
        }
    }

    #[tokio::test]
    async fn test_mutations_debounce_flush() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;

        session.add(LineRequest::new("mug", 1)).unwrap();
        fx.clock.advance(Duration::from_millis(300));
        session.add(LineRequest::new("mug", 1)).unwrap();
        fx.clock.advance(Duration::from_millis(300));

        assert!(!session.flush_if_due().await.unwrap());
        assert!(fx.persistence().load_local(&Identity::guest("g1")).unwrap().is_none());

        fx.clock.advance(Duration::from_millis(200));
        assert!(session.flush_if_due().await.unwrap());
        let stored = fx.persistence().load_local(&Identity::guest("g1")).unwrap().unwrap();
        assert_eq!(stored.items[0].quantity, 2);
        assert_eq!(session.pending().state(), FlushState::Idle);
    }

    #[tokio::test]
    async fn test_mutation_during_detached_flush_is_not_lost() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;

        session.add(LineRequest::new("mug", 1)).unwrap();
        fx.clock.advance(Duration::from_millis(500));
        let job = session.take_due_flush().unwrap();

        session.add(LineRequest::new("tee", 1)).unwrap();
        let result = job.run().await;
        session.complete_flush(&result);

        assert!(matches!(session.pending().state(), FlushState::Scheduled { .. }));
        session.flush_now().await.unwrap();
        let stored = fx.persistence().load_local(&Identity::guest("g1")).unwrap().unwrap();
        assert_eq!(stored.items.len(), 2);
    }

    #[tokio::test]
    async fn test_login_promotes_guest_cart_and_persists() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;
        session.add(LineRequest::new("mug", 1)).unwrap();
        session.add(LineRequest::new("tee", 1)).unwrap();

        let outcome = session
            .on_identity_change(IdentityTransition::new(
                Some(Identity::guest("g1")),
                Identity::user("ada"),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::PromotedGuest);
        assert_eq!(session.identity(), &Identity::user("ada"));
        let remote = fx
            .persistence()
            .load_remote(&UserId::new("ada"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remote.items.len(), 2);
        assert!(fx.persistence().load_local(&Identity::guest("g1")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_adopting_remote_discards_guest_copy() {
        let fx = Fixture::new().await;
        let mut ada = fx.open(Identity::user("ada")).await;
        ada.add(LineRequest::new("tee", 1)).unwrap();
        ada.flush_now().await.unwrap();

        let mut session = fx.open(Identity::guest("g1")).await;
        session.add(LineRequest::new("mug", 1)).unwrap();

        let outcome = session
            .on_identity_change(IdentityTransition::new(
                Some(Identity::guest("g1")),
                Identity::user("ada"),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::AdoptedStored);
        assert_eq!(session.cart().lines[0].product_id.as_str(), "tee");
        assert!(fx.persistence().load_local(&Identity::guest("g1")).unwrap().is_none());
        let local = fx.persistence().load_local(&Identity::user("ada")).unwrap().unwrap();
        assert_eq!(local.items.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_transition_is_noop() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;
        session.add(LineRequest::new("mug", 1)).unwrap();

        let login = IdentityTransition::new(Some(Identity::guest("g1")), Identity::user("ada"));
        session.on_identity_change(login.clone()).await.unwrap();
        session.add(LineRequest::new("tee", 1)).unwrap();

        let outcome = session.on_identity_change(login).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(session.cart().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_keeps_remote_cart() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::user("ada")).await;
        session.add(LineRequest::new("mug", 2)).unwrap();

        let outcome = session
            .on_identity_change(IdentityTransition::new(
                Some(Identity::user("ada")),
                Identity::guest("g2"),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::LoggedOut);
        assert!(session.cart().is_empty());
        assert!(fx.persistence().load_local(&Identity::user("ada")).unwrap().is_none());
        let remote: StoredCart = fx
            .persistence()
            .load_remote(&UserId::new("ada"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remote.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_checkout_clears_cart_and_refreshes_catalog() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::user("ada")).await;
        session.add(LineRequest::new("mug", 2)).unwrap();

        let receipt = session.checkout().await.unwrap();

        assert_eq!(receipt.units(), 2);
        assert!(session.cart().is_empty());
        assert_eq!(session.catalog().get(&"mug".into()).unwrap().stock, 3);
        let remote = fx
            .persistence()
            .load_remote(&UserId::new("ada"))
            .await
            .unwrap()
            .unwrap();
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;
        session.add(LineRequest::new("tee", 2)).unwrap();

        fx.store
            .put(
                product_key(&"tee".into()),
                product_document(&Product::new("tee", "Tee", Money::new(2000, Currency::USD)).with_stock(1)),
            )
            .await;

        let err = session.checkout().await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Checkout(crate::error::CheckoutError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert_eq!(session.cart().count(), 2);
    }

    #[tokio::test]
    async fn test_empty_checkout() {
        let fx = Fixture::new().await;
        let mut session = fx.open(Identity::guest("g1")).await;
        assert!(matches!(session.checkout().await, Err(CommerceError::EmptyCart)));
    }
}
