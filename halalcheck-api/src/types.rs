//! Pipeline component seams
//!
//! The orchestrator talks to its external collaborators through these
//! traits so integration tests can substitute in-memory fakes for the
//! network-backed implementations.

use async_trait::async_trait;

use crate::models::{AiAnalysis, AnalysisRequest, CertificationOutcome, ProductRecord};
use crate::services::ai_classifier::AiError;
use crate::services::off_client::OffError;

/// Result of a product lookup against the open product database
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Upstream does not know the barcode; terminal, nothing is persisted
    NotFound,
    Found(ProductRecord),
}

/// Identity inputs to the certification fan-out
#[derive(Debug, Clone, Default)]
pub struct CertificationQuery {
    pub product_name: Option<String>,
    pub barcode: Option<String>,
    pub brand: Option<String>,
    pub labels: Vec<String>,
}

/// Source of canonical product records (Open Food Facts in production)
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_by_barcode(&self, barcode: &str) -> Result<FetchOutcome, OffError>;
}

/// Certification registry fan-out
///
/// Never fails: worst case the outcome carries no certification and the
/// pipeline proceeds to ingredient analysis.
#[async_trait]
pub trait CertificationChecker: Send + Sync {
    async fn check(&self, query: &CertificationQuery) -> CertificationOutcome;
}

/// Language-model ingredient classification
#[async_trait]
pub trait IngredientClassifier: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AiAnalysis, AiError>;
}
