//! halalcheck-api library interface
//!
//! Exposes the verdict resolution pipeline and the HTTP surface for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::{OffClient, RateLimiter, VerdictOrchestrator};
use crate::types::{CertificationChecker, IngredientClassifier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Admission control service
    pub rate_limiter: Arc<RateLimiter>,
    /// Verdict resolution pipeline
    pub orchestrator: Arc<VerdictOrchestrator>,
    /// Open Food Facts client (name search)
    pub off_client: Arc<OffClient>,
    /// Certification fan-out (standalone endpoint)
    pub cert_checker: Arc<dyn CertificationChecker>,
    /// AI classifier; absent when no gateway credential is configured
    pub classifier: Option<Arc<dyn IngredientClassifier>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        rate_limiter: Arc<RateLimiter>,
        orchestrator: Arc<VerdictOrchestrator>,
        off_client: Arc<OffClient>,
        cert_checker: Arc<dyn CertificationChecker>,
        classifier: Option<Arc<dyn IngredientClassifier>>,
    ) -> Self {
        Self {
            db,
            rate_limiter,
            orchestrator,
            off_client,
            cert_checker,
            classifier,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lookup_routes())
        .merge(api::search_routes())
        .merge(api::certification_routes())
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
