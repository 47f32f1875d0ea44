//! halalcheck-api - Verdict Resolution Service
//!
//! Resolves halal-status verdicts for packaged-food products from three
//! evidence sources: the Open Food Facts product database, official halal
//! certification registries, and a language-model ingredient analysis.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use halalcheck_api::config::ServiceConfig;
use halalcheck_api::services::{
    AiClassifier, FanOutChecker, OffClient, ProductDataFetcher, RateLimiter, VerdictOrchestrator,
};
use halalcheck_api::types::{CertificationChecker, IngredientClassifier, ProductSource};
use halalcheck_api::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting halalcheck-api (Verdict Resolution) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration (ENV -> TOML -> defaults)
    let config = ServiceConfig::load()?;
    info!("Database: {}", config.database_path.display());

    // Initialize database connection pool
    let db_pool = halalcheck_api::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    // Admission control, swept periodically
    let rate_limiter = Arc::new(RateLimiter::new());
    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_expired().await;
        }
    });

    // Open Food Facts client + fetcher with cache side effect
    let off_client = Arc::new(OffClient::new()?);
    let product_source: Arc<dyn ProductSource> =
        Arc::new(ProductDataFetcher::new(off_client.clone(), db_pool.clone()));

    // Certification fan-out with the production probe set
    let probe_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let cert_checker: Arc<dyn CertificationChecker> = Arc::new(FanOutChecker::new(probe_http));

    // AI classifier, present only when a gateway credential is configured
    let classifier: Option<Arc<dyn IngredientClassifier>> = match &config.ai_api_key {
        Some(api_key) => {
            info!(model = %config.ai_model, "AI classifier enabled");
            let classifier: Arc<dyn IngredientClassifier> = Arc::new(AiClassifier::new(
                config.ai_gateway_url.clone(),
                api_key.clone(),
                config.ai_model.clone(),
            )?);
            Some(classifier)
        }
        None => None,
    };

    let orchestrator = Arc::new(VerdictOrchestrator::new(
        db_pool.clone(),
        product_source,
        cert_checker.clone(),
        classifier.clone(),
    ));

    let state = AppState::new(
        db_pool,
        rate_limiter,
        orchestrator,
        off_client,
        cert_checker,
        classifier,
    );

    let app = halalcheck_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
