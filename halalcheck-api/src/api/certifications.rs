//! Certification check endpoint
//!
//! Runs the certification fan-out on its own, without touching the
//! verdict store. Used for transparency views and re-checks.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::CertificationOutcome;
use crate::services::{rate_limiter, validation};
use crate::types::{CertificationChecker, CertificationQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationCheckRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

/// POST /api/certifications
pub async fn check_certifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CertificationCheckRequest>,
) -> ApiResult<Json<CertificationOutcome>> {
    let client_key = super::client_ip(&headers);
    let decision = state
        .rate_limiter
        .check(
            &client_key,
            "certification_check",
            &rate_limiter::CERTIFICATION_CHECK,
        )
        .await;
    if !decision.allowed {
        return Err(ApiError::TooManyRequests {
            reset_at: Some(decision.reset_at),
        });
    }

    let product_name =
        validation::validate_optional_string("productName", request.product_name.as_deref(), 200)?;
    let brand = validation::validate_optional_string("brand", request.brand.as_deref(), 100)?;
    let barcode = match request.barcode.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(validation::validate_barcode(raw)?),
        _ => None,
    };
    let labels = validation::validate_labels(request.labels).unwrap_or_default();

    tracing::info!(
        product_name = product_name.as_deref().unwrap_or(""),
        barcode = barcode.as_deref().unwrap_or(""),
        "Checking certifications"
    );

    let query = CertificationQuery {
        product_name,
        barcode,
        brand,
        labels,
    };
    let outcome = state.cert_checker.check(&query).await;

    Ok(Json(outcome))
}

pub fn certification_routes() -> Router<AppState> {
    Router::new().route("/api/certifications", post(check_certifications))
}
