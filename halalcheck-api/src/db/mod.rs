//! Database access for halalcheck-api
//!
//! SQLite storage for the product cache and the verdict store.

pub mod products;
pub mod verdicts;

use halalcheck_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the SQLite database and ensures the schema exists.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize halalcheck tables
///
/// Creates the products cache and verdicts tables if they don't exist.
/// Exposed so tests can run against an in-memory pool.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            barcode TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL DEFAULT '',
            ingredients_text TEXT NOT NULL DEFAULT '',
            ingredients_list TEXT NOT NULL DEFAULT '[]',
            image_url TEXT,
            region TEXT NOT NULL DEFAULT 'global',
            labels TEXT NOT NULL DEFAULT '[]',
            categories TEXT NOT NULL DEFAULT '[]',
            allergens TEXT NOT NULL DEFAULT '[]',
            raw_source TEXT NOT NULL DEFAULT '{}',
            fetched_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verdicts (
            id TEXT PRIMARY KEY,
            barcode TEXT NOT NULL UNIQUE,
            verdict TEXT NOT NULL,
            confidence_score INTEGER NOT NULL DEFAULT 0,
            analysis_notes TEXT NOT NULL DEFAULT '',
            flagged_ingredients TEXT,
            is_certified INTEGER NOT NULL DEFAULT 0,
            cert_body TEXT,
            cert_country TEXT,
            cert_link TEXT,
            analysis_method TEXT NOT NULL,
            external_source TEXT,
            ai_explanation TEXT,
            check_details TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT,
            last_verified_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (products, verdicts)");

    Ok(())
}
