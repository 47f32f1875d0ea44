//! Barcode lookup endpoint
//!
//! POST /api/lookup runs the full verdict pipeline for one barcode.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{ProductRecord, Verdict};
use crate::services::orchestrator::LookupOutcome;
use crate::services::{rate_limiter, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub barcode: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Whether the verdict was served from the store
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/lookup
pub async fn lookup_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LookupRequest>,
) -> ApiResult<Json<LookupResponse>> {
    let client_key = super::client_ip(&headers);
    let decision = state
        .rate_limiter
        .check(&client_key, "product_lookup", &rate_limiter::PRODUCT_LOOKUP)
        .await;
    if !decision.allowed {
        return Err(ApiError::TooManyRequests {
            reset_at: Some(decision.reset_at),
        });
    }

    let barcode = validation::validate_barcode(&request.barcode)?;

    match state.orchestrator.resolve_by_barcode(&barcode).await? {
        LookupOutcome::NotFound => Ok(Json(LookupResponse {
            found: false,
            product: None,
            verdict: None,
            cached: false,
            message: Some("Product not found in Open Food Facts database".to_string()),
        })),
        LookupOutcome::Resolved {
            product,
            verdict,
            cached,
        } => Ok(Json(LookupResponse {
            found: true,
            product: Some(product),
            verdict: Some(verdict),
            cached,
            message: None,
        })),
    }
}

pub fn lookup_routes() -> Router<AppState> {
    Router::new().route("/api/lookup", post(lookup_product))
}
