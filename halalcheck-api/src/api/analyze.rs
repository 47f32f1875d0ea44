//! AI ingredient analysis endpoint
//!
//! Runs the classifier on caller-provided ingredients. Answers 503 when
//! no gateway credential is configured.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{AiVerdict, AnalysisRequest, IngredientsInput};
use crate::services::{rate_limiter, validation};
use crate::types::IngredientClassifier;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    pub ingredients: IngredientsInput,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub verdict: AiVerdict,
    pub confidence_score: u8,
    pub flagged_ingredients: Vec<String>,
    pub analysis_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
    /// Raw model completion, for audit display
    pub ai_explanation: String,
    pub analysis_method: &'static str,
}

/// POST /api/analyze
pub async fn analyze_ingredients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let client_key = super::client_ip(&headers);
    let decision = state
        .rate_limiter
        .check(&client_key, "ai_analysis", &rate_limiter::AI_ANALYSIS)
        .await;
    if !decision.allowed {
        return Err(ApiError::TooManyRequests {
            reset_at: Some(decision.reset_at),
        });
    }

    let ingredients = validation::validate_ingredients(&request.ingredients)?;

    let Some(classifier) = state.classifier.clone() else {
        return Err(ApiError::ServiceUnavailable(
            "AI analysis is not configured".to_string(),
        ));
    };
    let product_name =
        validation::validate_optional_string("productName", request.product_name.as_deref(), 200)?;
    let brand = validation::validate_optional_string("brand", request.brand.as_deref(), 100)?;
    let region = validation::validate_region(request.region.as_deref());

    let analysis = classifier
        .analyze(&AnalysisRequest {
            product_name,
            brand,
            region,
            ingredients,
        })
        .await?;

    Ok(Json(AnalyzeResponse {
        verdict: analysis.verdict,
        confidence_score: analysis.confidence_score,
        flagged_ingredients: analysis.flagged_ingredients,
        analysis_notes: analysis.analysis_notes,
        recommendations: analysis.recommendations,
        ai_explanation: analysis.raw_model_output,
        analysis_method: "ai_analysis",
    }))
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze_ingredients))
}
