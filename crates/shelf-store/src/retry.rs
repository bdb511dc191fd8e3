//! Retry policies for optimistic transactions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Retry immediately.
    None,
    /// Fixed delay between attempts.
    Fixed { ms: u64 },
    /// Exponential backoff with base and max.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl BackoffStrategy {
    /// Delay before retrying after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { ms } => Duration::from_millis(*ms),
            Self::Exponential { base_ms, max_ms } => {
                let multiplier = 2u64.saturating_pow(attempt);
                Duration::from_millis(base_ms.saturating_mul(multiplier).min(*max_ms))
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base_ms: 10,
            max_ms: 200,
        }
    }
}

/// How many times a transaction may run before giving up, and how long to
/// wait between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffStrategy,
}

fn default_max_attempts() -> u32 {
    5
}

impl RetryPolicy {
    /// Create a policy with the default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
        }
    }

    /// A policy that runs the transaction exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Whether another attempt is allowed after `attempts` have run.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(default_max_attempts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_caps_at_max() {
        let backoff = BackoffStrategy::Exponential {
            base_ms: 10,
            max_ms: 50,
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(50));
        assert_eq!(backoff.delay_for_attempt(60), Duration::from_millis(50));
    }

    #[test]
    fn test_allows_retry() {
        let policy = RetryPolicy::new(3);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));

        let zero = RetryPolicy::new(0);
        assert!(!zero.allows_retry(1));
    }

    #[test]
    fn test_deserialize_from_json() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{"max_attempts": 8, "backoff": {"kind": "fixed", "ms": 25}}"#,
        )
        .unwrap();
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.backoff, BackoffStrategy::Fixed { ms: 25 });

        let defaulted: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted, RetryPolicy::default());
    }
}
