//! Error types for halalcheck-api
//!
//! Maps pipeline errors onto the HTTP surface. Client errors carry the
//! offending field or reset time; upstream failures are distinguished from
//! not-found, which is not an error at all (handlers answer it with a
//! `found: false` body).

use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

use crate::services::ai_classifier::AiError;
use crate::services::orchestrator::OrchestratorError;
use crate::services::validation::ValidationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Admission control or AI gateway rate limit (429)
    #[error("Rate limit exceeded. Please try again later.")]
    TooManyRequests { reset_at: Option<DateTime<Utc>> },

    /// AI gateway quota exhausted (402)
    #[error("AI credits exhausted. Please add credits to continue.")]
    QuotaExhausted,

    /// Upstream dependency failure (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Feature not configured (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Shared error type
    #[error("Common error: {0}")]
    Common(#[from] halalcheck_common::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::RateLimited => ApiError::TooManyRequests { reset_at: None },
            AiError::QuotaExhausted => ApiError::QuotaExhausted,
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::ProductFetch(e) => {
                ApiError::Upstream(format!("Failed to fetch product data: {}", e))
            }
            OrchestratorError::Ai(e) => e.into(),
            OrchestratorError::Store(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, reset_at) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::TooManyRequests { reset_at } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Rate limit exceeded. Please try again later.".to_string(),
                reset_at,
            ),
            ApiError::QuotaExhausted => (
                StatusCode::PAYMENT_REQUIRED,
                "QUOTA_EXHAUSTED",
                "AI credits exhausted. Please add credits to continue.".to_string(),
                None,
            ),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg, None),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
                None,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "resetAt": reset_at.map(|t| t.to_rfc3339()),
            }
        }));

        let mut response = (status, body).into_response();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_static("0"),
            );
            if let Some(reset) = reset_at {
                if let Ok(value) = HeaderValue::from_str(&reset.timestamp_millis().to_string()) {
                    headers.insert(HeaderName::from_static("x-ratelimit-reset"), value);
                }
            }
        }

        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
