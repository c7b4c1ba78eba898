//! Catalog product records.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;
use super::stock::Stock;

/// The mutable attribute set of a product.
///
/// This is what the form submits and what the table store receives on
/// insert and update. Optional text fields are sent as `null` when absent so
/// that an update clears them server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    /// Display name (non-empty after trimming).
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price.
    pub price: Price,
    /// Grouping label used by search.
    #[serde(default)]
    pub category: Option<String>,
    /// Units on hand.
    pub stock: Stock,
}

/// A product as held by the server, with its assigned identity.
///
/// The record shape on the wire is flat: `{"id": 1, "name": ..., "price": 9.99, ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Server-assigned identity, immutable after creation.
    pub id: ProductId,
    /// Current attribute values.
    #[serde(flatten)]
    pub fields: ProductFields,
}

impl Product {
    /// Create a product from its identity and attributes.
    #[must_use]
    pub const fn new(id: ProductId, fields: ProductFields) -> Self {
        Self { id, fields }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    /// Category, or the empty string when the product has none.
    #[must_use]
    pub fn category(&self) -> &str {
        self.fields.category.as_deref().unwrap_or("")
    }

    /// Case-insensitive substring match against name and category.
    ///
    /// `needle` must already be lower-cased; an empty needle matches everything.
    #[must_use]
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.fields.name.to_lowercase().contains(needle)
            || self.category().to_lowercase().contains(needle)
    }
}
