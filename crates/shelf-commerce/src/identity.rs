//! Shopper identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{GuestId, UserId};

/// Who owns a cart: an anonymous guest or a signed-in user, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    Guest(GuestId),
    User(UserId),
}

impl Identity {
    /// A fresh guest identity with a random id.
    pub fn new_guest() -> Self {
        Identity::Guest(GuestId::generate())
    }

    pub fn user(id: impl Into<UserId>) -> Self {
        Identity::User(id.into())
    }

    pub fn guest(id: impl Into<GuestId>) -> Self {
        Identity::Guest(id.into())
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest(_))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Guest(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Guest(id) => write!(f, "guest:{}", id),
            Identity::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Signal emitted by the auth layer whenever the active identity changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTransition {
    /// `None` on first observation (app start).
    pub previous: Option<Identity>,
    pub new: Identity,
}

/// What an [`IdentityTransition`] means for the active cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Nothing changed.
    Unchanged,
    /// First identity seen is a guest.
    GuestStart,
    /// A guest (or nobody) signed in.
    Login,
    /// A user signed out.
    Logout,
    /// One user replaced another without signing out in between.
    SwitchUser,
}

impl IdentityTransition {
    pub fn new(previous: Option<Identity>, new: Identity) -> Self {
        Self { previous, new }
    }

    pub fn kind(&self) -> TransitionKind {
        match (&self.previous, &self.new) {
            (Some(prev), new) if prev == new => TransitionKind::Unchanged,
            (None, Identity::Guest(_)) => TransitionKind::GuestStart,
            (Some(Identity::Guest(_)), Identity::Guest(_)) => TransitionKind::GuestStart,
            (None | Some(Identity::Guest(_)), Identity::User(_)) => TransitionKind::Login,
            (Some(Identity::User(_)), Identity::Guest(_)) => TransitionKind::Logout,
            (Some(Identity::User(_)), Identity::User(_)) => TransitionKind::SwitchUser,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_kinds() {
        let guest = Identity::guest("g1");
        let ada = Identity::user("ada");
        let bob = Identity::user("bob");

        let t = |p: Option<&Identity>, n: &Identity| IdentityTransition::new(p.cloned(), n.clone()).kind();

        assert_eq!(t(None, &guest), TransitionKind::GuestStart);
        assert_eq!(t(Some(&guest), &ada), TransitionKind::Login);
        assert_eq!(t(None, &ada), TransitionKind::Login);
        assert_eq!(t(Some(&ada), &guest), TransitionKind::Logout);
        assert_eq!(t(Some(&ada), &bob), TransitionKind::SwitchUser);
        assert_eq!(t(Some(&ada), &ada), TransitionKind::Unchanged);
    }

    #[test]
    fn test_identity_serde_shape() {
        let json = serde_json::to_value(Identity::user("ada")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "user", "id": "ada"}));
        assert_eq!(Identity::guest("g1").to_string(), "guest:g1");
    }
}
