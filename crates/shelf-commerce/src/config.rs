//! Commerce engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shelf_store::{BackoffStrategy, RetryPolicy};

use crate::error::CommerceError;
use crate::money::Currency;

/// Engine settings. Every field has a default, so an empty document is a
/// valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// Currency prices are read in.
    #[serde(default)]
    pub currency: Currency,

    #[serde(default)]
    pub checkout: CheckoutConfig,

    #[serde(default)]
    pub allocator: AllocatorConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl CommerceConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CommerceError> {
        if self.checkout.max_attempts == 0 {
            return Err(CommerceError::Config(
                "checkout.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.allocator.max_attempts == 0 {
            return Err(CommerceError::Config(
                "allocator.max_attempts must be at least 1".to_string(),
            ));
        }
        if let BackoffStrategy::Exponential { base_ms, max_ms } = self.checkout.backoff {
            if base_ms > max_ms {
                return Err(CommerceError::Config(format!(
                    "checkout.backoff base_ms ({}) exceeds max_ms ({})",
                    base_ms, max_ms
                )));
            }
        }
        Ok(())
    }

    /// Retry policy for checkout transactions.
    pub fn checkout_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.checkout.max_attempts).with_backoff(self.checkout.backoff.clone())
    }

    /// Retry policy for SKU allocation.
    pub fn allocator_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.allocator.max_attempts).with_backoff(self.allocator.backoff.clone())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }
}

/// Checkout transaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Attempts before giving up with a conflict (default: 5).
    #[serde(default = "default_checkout_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts.
    #[serde(default)]
    pub backoff: BackoffStrategy,
}

fn default_checkout_attempts() -> u32 {
    5
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_checkout_attempts(),
            backoff: BackoffStrategy::default(),
        }
    }
}

/// SKU allocator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Attempts before giving up (default: 16). Set it to at least the
    /// number of concurrent allocators to guarantee each one succeeds.
    #[serde(default = "default_allocator_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,
}

fn default_allocator_attempts() -> u32 {
    16
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_allocator_attempts(),
            backoff: BackoffStrategy::default(),
        }
    }
}

/// Cart persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Quiet period after the last mutation before a cart is written.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}
