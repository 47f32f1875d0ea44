//! Open Food Facts API client
//!
//! Barcode lookup and name search against the open product database. The
//! upstream payload is heterogeneous, so mapping into the canonical
//! `ProductRecord` applies field fallbacks rather than a strict schema.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ProductRecord, ProductSummary};
use crate::types::FetchOutcome;

const USER_AGENT: &str = "halalcheck/0.1.0 (https://github.com/halalcheck/halalcheck)";
const SEARCH_PAGE_SIZE: &str = "10";

/// Open Food Facts client errors
#[derive(Debug, Error)]
pub enum OffError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Open Food Facts error {0}: {1}")]
    Upstream(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Open Food Facts API client
pub struct OffClient {
    http_client: reqwest::Client,
    /// Overrides the public hosts; used by tests
    base_override: Option<String>,
}

impl OffClient {
    pub fn new() -> Result<Self, OffError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OffError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_override: None,
        })
    }

    /// Client pointed at a fixed base URL instead of the public hosts
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, OffError> {
        let mut client = Self::new()?;
        client.base_override = Some(base_url.into());
        Ok(client)
    }

    fn product_url(&self, barcode: &str) -> String {
        match &self.base_override {
            Some(base) => format!("{}/api/v2/product/{}.json", base, barcode),
            None => format!(
                "https://world.openfoodfacts.org/api/v2/product/{}.json",
                barcode
            ),
        }
    }

    fn search_url(&self, region: &str) -> String {
        match &self.base_override {
            Some(base) => format!("{}/cgi/search.pl", base),
            None => format!("https://{}.openfoodfacts.org/cgi/search.pl", region),
        }
    }

    /// Fetch one product by barcode
    ///
    /// Upstream signals "unknown barcode" with `status == 0` in the payload,
    /// not with an HTTP error code.
    pub async fn fetch_by_barcode(&self, barcode: &str) -> Result<FetchOutcome, OffError> {
        let url = self.product_url(barcode);
        tracing::debug!(barcode = %barcode, url = %url, "Querying Open Food Facts");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| OffError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OffError::Upstream(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| OffError::Parse(e.to_string()))?;

        if payload.get("status").and_then(Value::as_i64) == Some(0) {
            tracing::info!(barcode = %barcode, "Product not found in Open Food Facts");
            return Ok(FetchOutcome::NotFound);
        }

        let product = payload
            .get("product")
            .ok_or_else(|| OffError::Parse("missing product object in payload".to_string()))?;

        let record = map_product(barcode, product);
        tracing::info!(
            barcode = %barcode,
            name = %record.name,
            ingredients = record.ingredients_list.len(),
            "Fetched product from Open Food Facts"
        );

        Ok(FetchOutcome::Found(record))
    }

    /// Search products by name on the regional instance
    ///
    /// Rows without a barcode cannot enter the verdict pipeline and are
    /// dropped.
    pub async fn search_by_name(
        &self,
        product_name: &str,
        region: &str,
    ) -> Result<Vec<ProductSummary>, OffError> {
        let url = self.search_url(region);
        tracing::debug!(product_name = %product_name, region = %region, "Searching Open Food Facts");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("search_terms", product_name),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", SEARCH_PAGE_SIZE),
                ("fields", "code,product_name,brands,image_url,ingredients_text"),
            ])
            .send()
            .await
            .map_err(|e| OffError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OffError::Upstream(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| OffError::Parse(e.to_string()))?;

        let products = payload
            .get("products")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(map_summary).collect::<Vec<_>>())
            .unwrap_or_default();

        tracing::info!(count = products.len(), "Open Food Facts search completed");
        Ok(products)
    }
}

/// Map the heterogeneous upstream product object into the canonical record
pub(crate) fn map_product(barcode: &str, product: &Value) -> ProductRecord {
    let name = str_field(product, &["product_name", "product_name_en"])
        .unwrap_or_else(|| "Unknown Product".to_string());
    let brand = str_field(product, &["brands"]).unwrap_or_else(|| "Unknown Brand".to_string());
    let ingredients_text =
        str_field(product, &["ingredients_text", "ingredients_text_en"]).unwrap_or_default();

    let ingredients_list = product
        .get("ingredients")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    str_field(item, &["text", "id"])
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let region = tag_list(product, "countries_tags")
        .first()
        .map(|tag| tag.trim_start_matches("en:").to_string())
        .unwrap_or_else(|| "global".to_string());

    ProductRecord {
        barcode: barcode.to_string(),
        name,
        brand,
        ingredients_text,
        ingredients_list,
        image_url: str_field(product, &["image_url", "image_front_url"]),
        region,
        labels: tag_list(product, "labels_tags"),
        categories: tag_list(product, "categories_tags"),
        allergens: tag_list(product, "allergens_tags"),
        raw_source: product.clone(),
    }
}

fn map_summary(row: &Value) -> Option<ProductSummary> {
    let barcode = str_field(row, &["code"])?;
    Some(ProductSummary {
        barcode,
        name: str_field(row, &["product_name"]).unwrap_or_else(|| "Unknown Product".to_string()),
        brand: str_field(row, &["brands"]).unwrap_or_else(|| "Unknown Brand".to_string()),
        image_url: str_field(row, &["image_url"]),
        has_ingredients: str_field(row, &["ingredients_text"]).is_some(),
    })
}

/// First non-empty string among the candidate keys
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn tag_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
