//! Product data fetcher
//!
//! Wraps the Open Food Facts client with the cache side effect: every
//! successful fetch upserts the raw record into the product cache. The
//! cache write is best-effort and must never fail the user-facing request.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db;
use crate::services::off_client::{OffClient, OffError};
use crate::types::{FetchOutcome, ProductSource};

pub struct ProductDataFetcher {
    client: Arc<OffClient>,
    db: SqlitePool,
}

impl ProductDataFetcher {
    pub fn new(client: Arc<OffClient>, db: SqlitePool) -> Self {
        Self { client, db }
    }
}

#[async_trait]
impl ProductSource for ProductDataFetcher {
    async fn fetch_by_barcode(&self, barcode: &str) -> Result<FetchOutcome, OffError> {
        let outcome = self.client.fetch_by_barcode(barcode).await?;

        if let FetchOutcome::Found(product) = &outcome {
            if let Err(e) = db::products::cache_product(&self.db, product).await {
                tracing::warn!(
                    barcode = %barcode,
                    error = %e,
                    "Product cache write failed; continuing without cache"
                );
            }
        }

        Ok(outcome)
    }
}
