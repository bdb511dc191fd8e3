//! Identity reconciliation.
//!
//! Decides which cart becomes active when the shopper's identity changes.
//! This is a one-shot decision, not a sync: the session fetches the stored
//! cart for the new identity, calls [`reconcile`], and persists the result
//! when asked to.

use tracing::info;

use crate::cart::Cart;
use crate::identity::{IdentityTransition, TransitionKind};
use crate::persistence::StoredCart;

/// What reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Same identity as before; the active cart is untouched.
    Unchanged,
    /// The user's stored cart had lines and replaced the active one.
    AdoptedStored,
    /// The user had nothing stored; the guest's lines moved over.
    PromotedGuest,
    /// The new identity starts with an empty cart.
    StartedEmpty,
    /// The user signed out; the new guest starts empty.
    LoggedOut,
}

/// Result of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub cart: Cart,
    pub outcome: Outcome,
    /// The new cart must be written under the new identity.
    pub persist: bool,
}

/// Pick the active cart for `transition.new`.
///
/// `active` is the cart in use before the transition. `stored` is whatever
/// is persisted for the new identity: the remote cart for a user, the local
/// copy for a guest.
pub fn reconcile(transition: &IdentityTransition, active: &Cart, stored: Option<StoredCart>) -> Reconciled {
    let new = transition.new.clone();
    let currency = active.currency;
    let stored = stored.filter(|s| !s.is_empty());

    let (cart, outcome, persist) = match transition.kind() {
        TransitionKind::Unchanged => (active.clone(), Outcome::Unchanged, false),
        TransitionKind::Login => match stored {
            Some(stored) => (stored.into_cart(new, currency), Outcome::AdoptedStored, false),
            None if !active.is_empty() => {
                let mut cart = active.clone();
                cart.retag_owner(new);
                (cart, Outcome::PromotedGuest, true)
            }
            None => (Cart::new(new, currency), Outcome::StartedEmpty, false),
        },
        TransitionKind::SwitchUser | TransitionKind::GuestStart => match stored {
            Some(stored) => (stored.into_cart(new, currency), Outcome::AdoptedStored, false),
            None => (Cart::new(new, currency), Outcome::StartedEmpty, false),
        },
        TransitionKind::Logout => (Cart::new(new, currency), Outcome::LoggedOut, false),
    };

    if outcome != Outcome::Unchanged {
        info!(
            previous = ?transition.previous.as_ref().map(ToString::to_string),
            new = %transition.new,
            ?outcome,
            lines = cart.len(),
            "Cart reconciled"
        );
    }

    Reconciled {
        cart,
        outcome,
        persist,
    }
}
