//! Verdict orchestrator
//!
//! Top-level pipeline for one barcode lookup:
//! fetch -> cached-verdict check -> certification fan-out -> ingredient
//! analysis -> persist. Steps are strictly sequential; an existing verdict
//! row is a terminal cache hit and is returned unchanged.
//!
//! Merge precedence: certification > AI > insufficient-data > rules
//! fallback. Certification evidence always wins over ingredient inference.

use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

use crate::db;
use crate::db::verdicts::InsertOutcome;
use crate::models::{AnalysisRequest, IngredientsInput, ProductRecord, Verdict};
use crate::services::ai_classifier::AiError;
use crate::services::off_client::OffError;
use crate::types::{
    CertificationChecker, CertificationQuery, FetchOutcome, IngredientClassifier, ProductSource,
};

/// Pipeline errors that surface to the caller
///
/// Certification probe failures never appear here; they degrade inside the
/// fan-out. Parse failures degrade inside the classifier.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Product database transport/HTTP failure (distinct from not-found)
    #[error("Failed to fetch product data: {0}")]
    ProductFetch(#[from] OffError),

    /// AI gateway failure (429/402 carry their own variants inside)
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Verdict store read failure
    #[error(transparent)]
    Store(#[from] halalcheck_common::Error),
}

/// Result of a barcode lookup
#[derive(Debug)]
pub enum LookupOutcome {
    /// Barcode unknown upstream; nothing persisted, terminal state
    NotFound,
    Resolved {
        product: ProductRecord,
        verdict: Verdict,
        /// Whether the verdict came from the store rather than being
        /// computed on this request
        cached: bool,
    },
}

pub struct VerdictOrchestrator {
    db: SqlitePool,
    product_source: Arc<dyn ProductSource>,
    cert_checker: Arc<dyn CertificationChecker>,
    /// Absent when no gateway credential is configured; the pipeline then
    /// degrades to the rules-engine verdict instead of calling the AI.
    classifier: Option<Arc<dyn IngredientClassifier>>,
}

impl VerdictOrchestrator {
    pub fn new(
        db: SqlitePool,
        product_source: Arc<dyn ProductSource>,
        cert_checker: Arc<dyn CertificationChecker>,
        classifier: Option<Arc<dyn IngredientClassifier>>,
    ) -> Self {
        if classifier.is_none() {
            tracing::warn!(
                "No AI classifier configured; uncertified products will get rules-engine verdicts"
            );
        }
        Self {
            db,
            product_source,
            cert_checker,
            classifier,
        }
    }

    /// Run the full pipeline for one barcode
    pub async fn resolve_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<LookupOutcome, OrchestratorError> {
        tracing::info!(barcode = %barcode, "Resolving verdict");

        // Phase 1: fetch canonical product data
        let product = match self.product_source.fetch_by_barcode(barcode).await? {
            FetchOutcome::NotFound => {
                tracing::info!(barcode = %barcode, "Product not found, nothing persisted");
                return Ok(LookupOutcome::NotFound);
            }
            FetchOutcome::Found(product) => product,
        };

        // Phase 2: existing verdict short-circuits; repeated lookups never
        // re-run certification or AI
        if let Some(existing) = db::verdicts::find_by_barcode(&self.db, barcode).await? {
            tracing::info!(barcode = %barcode, "Verdict cache hit");
            return Ok(LookupOutcome::Resolved {
                product,
                verdict: existing,
                cached: true,
            });
        }

        // Phase 3: certification fan-out
        let query = CertificationQuery {
            product_name: Some(product.name.clone()),
            barcode: Some(barcode.to_string()),
            brand: Some(product.brand.clone()),
            labels: product.labels.clone(),
        };
        let certification = self.cert_checker.check(&query).await;

        // Phase 4: decision cascade
        let verdict = if certification.is_certified {
            tracing::info!(
                barcode = %barcode,
                cert_body = certification.cert_body.as_deref().unwrap_or("unknown"),
                "Certified halal, skipping ingredient analysis"
            );
            Verdict::certified(barcode, &certification)
        } else if !product.has_ingredients() {
            tracing::info!(barcode = %barcode, "No ingredient data, skipping AI analysis");
            Verdict::insufficient_data(barcode, certification.check_details)
        } else {
            match &self.classifier {
                Some(classifier) => {
                    let request = analysis_request(&product);
                    let analysis = classifier.analyze(&request).await?;
                    Verdict::from_ai(barcode, &analysis, certification.check_details)
                }
                None => Verdict::rules_fallback(barcode, certification.check_details),
            }
        };

        // Phase 5: best-effort persist
        let verdict = self.persist(verdict).await;

        Ok(LookupOutcome::Resolved {
            product,
            verdict,
            cached: false,
        })
    }

    /// Insert-if-absent; the in-memory verdict stays authoritative for this
    /// response when the write fails, and a concurrent winner is returned
    /// in place of ours on conflict.
    async fn persist(&self, verdict: Verdict) -> Verdict {
        match db::verdicts::insert_if_absent(&self.db, &verdict).await {
            Ok(InsertOutcome::Inserted) => verdict,
            Ok(InsertOutcome::AlreadyExists(winner)) => {
                tracing::info!(
                    barcode = %winner.barcode,
                    "Concurrent verdict insert lost the race; returning the persisted row"
                );
                winner
            }
            Err(e) => {
                tracing::warn!(
                    barcode = %verdict.barcode,
                    error = %e,
                    "Verdict persist failed; returning in-memory verdict"
                );
                verdict
            }
        }
    }
}

/// Build the classifier input, preferring the structured ingredient list
/// over the free-text declaration when both are present
fn analysis_request(product: &ProductRecord) -> AnalysisRequest {
    let ingredients = if !product.ingredients_list.is_empty() {
        IngredientsInput::List(product.ingredients_list.clone())
    } else {
        IngredientsInput::Text(product.ingredients_text.clone())
    };
    AnalysisRequest {
        product_name: Some(product.name.clone()),
        brand: Some(product.brand.clone()),
        region: product.region.clone(),
        ingredients,
    }
}
