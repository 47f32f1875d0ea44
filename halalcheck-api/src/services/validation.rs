//! Request payload validation
//!
//! Field-level coercion and rejection applied before any pipeline work.
//! Validation stops at the first failing field; the error names that field.

use thiserror::Error;

use crate::models::IngredientsInput;

/// Regions with a dedicated Open Food Facts mirror; anything else falls
/// back to the world-wide instance.
const ALLOWED_REGIONS: &[&str] = &["world", "us", "uk", "fr", "de", "ca", "au", "global"];

const MAX_LABELS: usize = 50;
const MAX_LABEL_LEN: usize = 100;
const MAX_INGREDIENT_ITEM_LEN: usize = 500;
const MAX_INGREDIENTS_TEXT_LEN: usize = 10_000;

/// Validation failure for a single request field
#[derive(Debug, Clone, Error)]
#[error("Validation error for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Barcode: 8-14 digits after trim
pub fn validate_barcode(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let digits_only = !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || trimmed.len() < 8 || trimmed.len() > 14 {
        return Err(ValidationError::new("barcode", "Barcode must be 8-14 digits"));
    }
    Ok(trimmed.to_string())
}

/// Product name: 2-200 characters after trim
pub fn validate_product_name(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < 2 {
        return Err(ValidationError::new(
            "productName",
            "Product name must be at least 2 characters",
        ));
    }
    if len > 200 {
        return Err(ValidationError::new(
            "productName",
            "Product name must be less than 200 characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Region: allow-listed values pass through; anything else silently
/// defaults to `world`. Deliberate leniency, not an error.
pub fn validate_region(value: Option<&str>) -> String {
    match value {
        Some(region) if ALLOWED_REGIONS.contains(&region) => region.to_string(),
        _ => "world".to_string(),
    }
}

/// Optional free-form string: trimmed, length-capped, empty becomes absent
pub fn validate_optional_string(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("{} must be less than {} characters", field, max_len),
        ));
    }
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

/// Ingredients: a structured list (each item <= 500 chars) or a single
/// text blob (<= 10000 chars); must be non-empty either way.
pub fn validate_ingredients(value: &IngredientsInput) -> Result<IngredientsInput, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(
            "ingredients",
            "Ingredients are required for analysis",
        ));
    }
    match value {
        IngredientsInput::List(items) => {
            for item in items {
                if item.chars().count() > MAX_INGREDIENT_ITEM_LEN {
                    return Err(ValidationError::new(
                        "ingredients",
                        format!(
                            "Individual ingredient must be less than {} characters",
                            MAX_INGREDIENT_ITEM_LEN
                        ),
                    ));
                }
            }
            Ok(value.clone())
        }
        IngredientsInput::Text(text) => {
            if text.chars().count() > MAX_INGREDIENTS_TEXT_LEN {
                return Err(ValidationError::new(
                    "ingredients",
                    format!(
                        "Ingredients text must be less than {} characters",
                        MAX_INGREDIENTS_TEXT_LEN
                    ),
                ));
            }
            Ok(value.clone())
        }
    }
}

/// Labels: capped at 50 entries of at most 100 characters each. Oversized
/// input is truncated rather than rejected.
pub fn validate_labels(value: Option<Vec<String>>) -> Option<Vec<String>> {
    let labels = value?;
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .into_iter()
            .take(MAX_LABELS)
            .map(|label| truncate_chars(&label, MAX_LABEL_LEN))
            .collect(),
    )
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        value.chars().take(max_chars).collect()
    }
}
