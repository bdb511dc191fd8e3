//! Composite line keys.
//!
//! Two add-to-cart requests that resolve to the same product, variant,
//! extras and custom field answers land on the same line. The key is derived
//! deterministically from those parts, with extras sorted so the order they
//! were picked in does not matter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ExtraId, ProductId, VariantId};

/// Free-text answers to a product's custom fields, keyed by field name.
pub type CustomFields = BTreeMap<String, String>;

/// Composite identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the key for a selection.
    ///
    /// Layout: `{product}__{variant|base}__{extras}__{custom fields}`, where
    /// extras are a sorted JSON array of `[id, variant, quantity, value]`
    /// entries and custom fields are their JSON object form. Free text only
    /// ever appears inside JSON strings, so it cannot forge a separator.
    pub fn compose(
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        extras: &[ExtraSelection],
        custom_fields: &CustomFields,
    ) -> Self {
        let mut signature: Vec<_> = extras.iter().map(ExtraSelection::signature).collect();
        signature.sort();

        // Strings, integers and maps of strings always serialize.
        let extras = serde_json::to_string(&signature).unwrap_or_default();
        let fields = serde_json::to_string(custom_fields).unwrap_or_default();

        Self(format!(
            "{}__{}__{}__{}",
            product_id,
            variant_id.map(VariantId::as_str).unwrap_or("base"),
            extras,
            fields
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An extra picked for a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraSelection {
    pub extra_id: ExtraId,
    /// Chosen variant of the extra, when it has variants.
    pub variant_id: Option<VariantId>,
    /// Units of the extra per unit of the line.
    pub quantity: i64,
    /// Free-text value (an engraving, a note).
    pub value: Option<String>,
}

impl ExtraSelection {
    pub fn new(extra_id: impl Into<ExtraId>, quantity: i64) -> Self {
        Self {
            extra_id: extra_id.into(),
            variant_id: None,
            quantity,
            value: None,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<VariantId>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn signature(&self) -> (&str, Option<&str>, i64, Option<&str>) {
        (
            self.extra_id.as_str(),
            self.variant_id.as_ref().map(VariantId::as_str),
            self.quantity,
            self.value.as_deref(),
        )
    }
}
