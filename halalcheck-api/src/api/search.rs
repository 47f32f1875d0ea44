//! Product name search endpoint

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::ProductSummary;
use crate::services::{rate_limiter, validation};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub product_name: String,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub products: Vec<ProductSummary>,
    pub count: usize,
}

/// POST /api/search
pub async fn search_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let client_key = super::client_ip(&headers);
    let decision = state
        .rate_limiter
        .check(&client_key, "name_search", &rate_limiter::NAME_SEARCH)
        .await;
    if !decision.allowed {
        return Err(ApiError::TooManyRequests {
            reset_at: Some(decision.reset_at),
        });
    }

    let product_name = validation::validate_product_name(&request.product_name)?;
    let region = validation::validate_region(request.region.as_deref());

    let products = state
        .off_client
        .search_by_name(&product_name, &region)
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to search products: {}", e)))?;

    let count = products.len();
    Ok(Json(SearchResponse { products, count }))
}

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", post(search_products))
}
