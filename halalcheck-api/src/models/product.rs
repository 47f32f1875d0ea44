//! Canonical product record sourced from the open product database

use serde::{Deserialize, Serialize};

/// Canonical product record mapped from the Open Food Facts payload
///
/// Immutable once fetched within a request; a later lookup re-fetches
/// instead of mutating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Identity key, 8-14 digits
    pub barcode: String,
    pub name: String,
    pub brand: String,
    /// Free-text ingredient declaration (may be empty)
    pub ingredients_text: String,
    /// Structured ingredient names, in label order (may be empty)
    pub ingredients_list: Vec<String>,
    pub image_url: Option<String>,
    /// Derived from the first source country tag; `global` when absent
    pub region: String,
    /// Source-provided label tags, used for certification heuristics
    pub labels: Vec<String>,
    pub categories: Vec<String>,
    pub allergens: Vec<String>,
    /// Opaque upstream payload, retained for caching and debugging
    pub raw_source: serde_json::Value,
}

impl ProductRecord {
    /// Whether any ingredient data is present (structured list or free text)
    pub fn has_ingredients(&self) -> bool {
        !self.ingredients_list.is_empty() || !self.ingredients_text.trim().is_empty()
    }
}

/// Compact row returned by the name-search operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub image_url: Option<String>,
    pub has_ingredients: bool,
}
