//! Document keys, versions and write batches.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of a document: a collection name plus an id within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    collection: String,
    id: String,
}

impl DocumentKey {
    /// Create a key from a collection and id.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// The collection this document lives in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The document id within its collection.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Monotonic per-document version. Every successful write bumps it by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version assigned to a freshly created document.
    pub const INITIAL: Version = Version(1);

    /// Wrap a raw version number.
    pub fn new(v: u64) -> Self {
        Self(v)
    }

    /// The version that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Raw version number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// Condition a document must satisfy for a batch to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The document must not exist.
    Absent,
    /// The document must still be at exactly this version.
    AtVersion(Version),
}

impl Precondition {
    /// Precondition matching what a read observed.
    pub fn from_observed(version: Option<Version>) -> Self {
        match version {
            Some(v) => Precondition::AtVersion(v),
            None => Precondition::Absent,
        }
    }

    /// Check the precondition against the document's current version.
    pub fn holds(&self, current: Option<Version>) -> bool {
        match (self, current) {
            (Precondition::Absent, None) => true,
            (Precondition::AtVersion(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

/// A set of writes applied together, or not at all.
///
/// Every check must hold at commit time; otherwise the store rejects the
/// whole batch with [`StoreError::Conflict`](crate::StoreError::Conflict).
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub checks: Vec<(DocumentKey, Precondition)>,
    pub writes: Vec<(DocumentKey, Value)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a document to satisfy a precondition.
    pub fn check(mut self, key: DocumentKey, precondition: Precondition) -> Self {
        self.checks.push((key, precondition));
        self
    }

    /// Replace a document's contents.
    pub fn put(mut self, key: DocumentKey, value: Value) -> Self {
        self.writes.push((key, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = DocumentKey::new("products", "p-1");
        assert_eq!(key.to_string(), "products/p-1");
        assert_eq!(key.collection(), "products");
        assert_eq!(key.id(), "p-1");
    }

    #[test]
    fn test_version_next() {
        assert_eq!(Version::INITIAL.next(), Version::new(2));
    }

    #[test]
    fn test_precondition_holds() {
        let v3 = Version::new(3);
        assert!(Precondition::Absent.holds(None));
        assert!(!Precondition::Absent.holds(Some(v3)));
        assert!(Precondition::AtVersion(v3).holds(Some(v3)));
        assert!(!Precondition::AtVersion(v3).holds(Some(v3.next())));
        assert!(!Precondition::AtVersion(v3).holds(None));
    }

    #[test]
    fn test_precondition_from_observed() {
        assert_eq!(Precondition::from_observed(None), Precondition::Absent);
        assert_eq!(
            Precondition::from_observed(Some(Version::INITIAL)),
            Precondition::AtVersion(Version::INITIAL)
        );
    }
}
