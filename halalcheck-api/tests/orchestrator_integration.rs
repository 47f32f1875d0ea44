//! Verdict orchestrator integration tests
//!
//! Exercises the pipeline state machine against an in-memory database and
//! fake collaborators, covering the decision cascade, the idempotence
//! guarantee, and the degraded modes.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use halalcheck_api::db;
use halalcheck_api::models::{
    AiAnalysis, AiVerdict, AnalysisMethod, AnalysisRequest, CertificationOutcome, ProductRecord,
    VerdictStatus,
};
use halalcheck_api::services::ai_classifier::AiError;
use halalcheck_api::services::certification::FanOutChecker;
use halalcheck_api::services::off_client::OffError;
use halalcheck_api::services::orchestrator::{LookupOutcome, VerdictOrchestrator};
use halalcheck_api::types::{
    CertificationChecker, CertificationQuery, FetchOutcome, IngredientClassifier, ProductSource,
};

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

fn test_product(barcode: &str, labels: &[&str], ingredients: &[&str]) -> ProductRecord {
    ProductRecord {
        barcode: barcode.to_string(),
        name: "Test Biscuits".to_string(),
        brand: "Testco".to_string(),
        ingredients_text: ingredients.join(", "),
        ingredients_list: ingredients.iter().map(|s| s.to_string()).collect(),
        image_url: None,
        region: "world".to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        categories: vec![],
        allergens: vec![],
        raw_source: serde_json::json!({}),
    }
}

/// Product source returning a fixed record (or not-found), counting calls
struct FakeProductSource {
    product: Option<ProductRecord>,
    calls: AtomicUsize,
}

impl FakeProductSource {
    fn new(product: Option<ProductRecord>) -> Self {
        Self {
            product,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProductSource for FakeProductSource {
    async fn fetch_by_barcode(&self, _barcode: &str) -> Result<FetchOutcome, OffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.product {
            Some(product) => FetchOutcome::Found(product.clone()),
            None => FetchOutcome::NotFound,
        })
    }
}

/// Certification checker returning a fixed outcome, counting calls
struct FakeCertChecker {
    outcome: CertificationOutcome,
    calls: AtomicUsize,
}

impl FakeCertChecker {
    fn miss() -> Self {
        Self {
            outcome: CertificationOutcome::not_certified(vec![]),
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(cert_body: &str) -> Self {
        Self {
            outcome: CertificationOutcome {
                is_certified: true,
                cert_body: Some(cert_body.to_string()),
                cert_country: Some("Malaysia".to_string()),
                cert_link: Some("https://registry.test/1".to_string()),
                confidence_score: 95,
                external_source: Some(cert_body.to_lowercase()),
                check_details: vec![],
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CertificationChecker for FakeCertChecker {
    async fn check(&self, _query: &CertificationQuery) -> CertificationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Classifier returning a fixed analysis, counting calls
struct FakeClassifier {
    analysis: AiAnalysis,
    calls: AtomicUsize,
}

impl FakeClassifier {
    fn new(verdict: AiVerdict, confidence_score: u8, flagged: &[&str]) -> Self {
        Self {
            analysis: AiAnalysis {
                verdict,
                confidence_score,
                flagged_ingredients: flagged.iter().map(|s| s.to_string()).collect(),
                analysis_notes: "Automated ingredient review.".to_string(),
                recommendations: None,
                raw_model_output: "{\"verdict\": \"...\"}".to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IngredientClassifier for FakeClassifier {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AiAnalysis, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.analysis.clone())
    }
}

fn dyn_classifier(classifier: &Arc<FakeClassifier>) -> Option<Arc<dyn IngredientClassifier>> {
    let classifier: Arc<dyn IngredientClassifier> = classifier.clone();
    Some(classifier)
}

#[tokio::test]
async fn test_not_found_is_terminal_and_persists_nothing() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(None));
    let cert = Arc::new(FakeCertChecker::miss());
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::Halal, 90, &[]));

    let orchestrator = VerdictOrchestrator::new(
        pool.clone(),
        source.clone(),
        cert.clone(),
        dyn_classifier(&classifier),
    );

    let outcome = orchestrator.resolve_by_barcode("0123456789012").await.unwrap();
    assert!(matches!(outcome, LookupOutcome::NotFound));

    // No downstream step ran, nothing was persisted
    assert_eq!(cert.calls.load(Ordering::SeqCst), 0);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert!(db::verdicts::find_by_barcode(&pool, "0123456789012")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_certification_hit_bypasses_ai() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "12345678",
        &[],
        &["pork gelatin"],
    ))));
    let cert = Arc::new(FakeCertChecker::hit("JAKIM"));
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::NotHalal, 95, &["pork gelatin"]));

    let orchestrator =
        VerdictOrchestrator::new(pool.clone(), source, cert, dyn_classifier(&classifier));

    let outcome = orchestrator.resolve_by_barcode("12345678").await.unwrap();
    let LookupOutcome::Resolved { verdict, cached, .. } = outcome else {
        panic!("expected resolved outcome");
    };

    // Certification precedence: halal even though ingredients are flagged
    assert!(!cached);
    assert_eq!(verdict.status, VerdictStatus::Halal);
    assert_eq!(verdict.analysis_method, AnalysisMethod::CertificationVerified);
    assert!(verdict.is_certified);
    assert_eq!(verdict.cert_body.as_deref(), Some("JAKIM"));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_label_precedence_with_real_fanout_checker() {
    // The real checker, no probes configured: the halal label alone must
    // certify, even though the ingredient list contains a forbidden term.
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "4001234567890",
        &["en:halal-certified"],
        &["lard"],
    ))));
    let cert: Arc<dyn CertificationChecker> = Arc::new(FanOutChecker::with_probes(
        vec![],
        Duration::from_millis(50),
    ));
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::NotHalal, 95, &["lard"]));

    let orchestrator =
        VerdictOrchestrator::new(pool.clone(), source, cert, dyn_classifier(&classifier));

    let outcome = orchestrator.resolve_by_barcode("4001234567890").await.unwrap();
    let LookupOutcome::Resolved { verdict, .. } = outcome else {
        panic!("expected resolved outcome");
    };

    assert_eq!(verdict.status, VerdictStatus::Halal);
    assert_eq!(verdict.analysis_method, AnalysisMethod::CertificationVerified);
    assert_eq!(verdict.confidence_score, 85);
    assert_eq!(verdict.external_source.as_deref(), Some("label_tags"));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_insufficient_data_skips_ai() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "87654321", &[], &[],
    ))));
    let cert = Arc::new(FakeCertChecker::miss());
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::Halal, 90, &[]));

    let orchestrator =
        VerdictOrchestrator::new(pool.clone(), source, cert, dyn_classifier(&classifier));

    let outcome = orchestrator.resolve_by_barcode("87654321").await.unwrap();
    let LookupOutcome::Resolved { verdict, .. } = outcome else {
        panic!("expected resolved outcome");
    };

    assert_eq!(verdict.status, VerdictStatus::Unclear);
    assert_eq!(verdict.confidence_score, 0);
    assert_eq!(verdict.analysis_method, AnalysisMethod::InsufficientData);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ai_analysis_merges_and_persists() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "11112222",
        &[],
        &["sugar", "carmine"],
    ))));
    let cert = Arc::new(FakeCertChecker::miss());
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::Questionable, 60, &["carmine"]));

    let orchestrator =
        VerdictOrchestrator::new(pool.clone(), source, cert, dyn_classifier(&classifier));

    let outcome = orchestrator.resolve_by_barcode("11112222").await.unwrap();
    let LookupOutcome::Resolved { verdict, .. } = outcome else {
        panic!("expected resolved outcome");
    };

    // questionable persists as unclear
    assert_eq!(verdict.status, VerdictStatus::Unclear);
    assert_eq!(verdict.confidence_score, 60);
    assert_eq!(verdict.analysis_method, AnalysisMethod::AiAnalysis);
    assert_eq!(
        verdict.flagged_ingredients.as_deref(),
        Some(&["carmine".to_string()][..])
    );
    assert!(verdict.ai_explanation.is_some());

    let stored = db::verdicts::find_by_barcode(&pool, "11112222")
        .await
        .unwrap()
        .expect("verdict row persisted");
    assert_eq!(stored.id, verdict.id);
    assert_eq!(stored.status, VerdictStatus::Unclear);
}

#[tokio::test]
async fn test_second_lookup_is_idempotent() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "99998888",
        &[],
        &["sugar"],
    ))));
    let cert = Arc::new(FakeCertChecker::miss());
    let classifier = Arc::new(FakeClassifier::new(AiVerdict::Halal, 88, &[]));

    let orchestrator = VerdictOrchestrator::new(
        pool.clone(),
        source.clone(),
        cert.clone(),
        dyn_classifier(&classifier),
    );

    let first = orchestrator.resolve_by_barcode("99998888").await.unwrap();
    let LookupOutcome::Resolved { verdict: first_verdict, cached: first_cached, .. } = first else {
        panic!("expected resolved outcome");
    };
    assert!(!first_cached);

    let second = orchestrator.resolve_by_barcode("99998888").await.unwrap();
    let LookupOutcome::Resolved { verdict: second_verdict, cached: second_cached, .. } = second
    else {
        panic!("expected resolved outcome");
    };

    // Identical verdict, zero additional certification or AI calls
    assert!(second_cached);
    assert_eq!(second_verdict.id, first_verdict.id);
    assert_eq!(second_verdict.status, first_verdict.status);
    assert_eq!(cert.calls.load(Ordering::SeqCst), 1);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    // The product itself is re-fetched, not cached
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_classifier_degrades_to_rules_engine() {
    let pool = test_pool().await;
    let source = Arc::new(FakeProductSource::new(Some(test_product(
        "55556666",
        &[],
        &["sugar"],
    ))));
    let cert = Arc::new(FakeCertChecker::miss());

    let orchestrator = VerdictOrchestrator::new(pool.clone(), source, cert, None);

    let outcome = orchestrator.resolve_by_barcode("55556666").await.unwrap();
    let LookupOutcome::Resolved { verdict, .. } = outcome else {
        panic!("expected resolved outcome");
    };

    assert_eq!(verdict.status, VerdictStatus::Unclear);
    assert_eq!(verdict.confidence_score, 50);
    assert_eq!(verdict.analysis_method, AnalysisMethod::RulesEngine);
}
