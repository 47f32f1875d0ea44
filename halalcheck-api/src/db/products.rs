//! Product cache persistence
//!
//! The cache is a best-effort side effect of the product fetch: a write
//! failure is logged by the caller and never fails the user-facing request.

use chrono::Utc;
use halalcheck_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::ProductRecord;

/// Upsert the raw product record, keyed by barcode
///
/// Re-fetching refreshes the row in place; `fetched_at` tracks the last
/// successful fetch.
pub async fn cache_product(pool: &SqlitePool, product: &ProductRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (
            barcode, name, brand, ingredients_text, ingredients_list,
            image_url, region, labels, categories, allergens, raw_source, fetched_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(barcode) DO UPDATE SET
            name = excluded.name,
            brand = excluded.brand,
            ingredients_text = excluded.ingredients_text,
            ingredients_list = excluded.ingredients_list,
            image_url = excluded.image_url,
            region = excluded.region,
            labels = excluded.labels,
            categories = excluded.categories,
            allergens = excluded.allergens,
            raw_source = excluded.raw_source,
            fetched_at = excluded.fetched_at
        "#,
    )
    .bind(&product.barcode)
    .bind(&product.name)
    .bind(&product.brand)
    .bind(&product.ingredients_text)
    .bind(serde_json::to_string(&product.ingredients_list).unwrap_or_else(|_| "[]".to_string()))
    .bind(&product.image_url)
    .bind(&product.region)
    .bind(serde_json::to_string(&product.labels).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(&product.categories).unwrap_or_else(|_| "[]".to_string()))
    .bind(serde_json::to_string(&product.allergens).unwrap_or_else(|_| "[]".to_string()))
    .bind(product.raw_source.to_string())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a cached product record by barcode
pub async fn find_cached(pool: &SqlitePool, barcode: &str) -> Result<Option<ProductRecord>> {
    let row = sqlx::query("SELECT * FROM products WHERE barcode = ?1")
        .bind(barcode)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let json_list = |column: &str| -> Vec<String> {
        row.try_get::<String, _>(column)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    };

    Ok(Some(ProductRecord {
        barcode: row.try_get("barcode")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        ingredients_text: row.try_get("ingredients_text")?,
        ingredients_list: json_list("ingredients_list"),
        image_url: row.try_get("image_url")?,
        region: row.try_get("region")?,
        labels: json_list("labels"),
        categories: json_list("categories"),
        allergens: json_list("allergens"),
        raw_source: row
            .try_get::<String, _>("raw_source")
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null),
    }))
}
