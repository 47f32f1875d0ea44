//! Persisted verdict and certification-check types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analysis::AiAnalysis;

/// Final halal-status classification for one barcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Halal,
    NotHalal,
    Unclear,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Halal => "halal",
            VerdictStatus::NotHalal => "not_halal",
            VerdictStatus::Unclear => "unclear",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "halal" => Some(VerdictStatus::Halal),
            "not_halal" => Some(VerdictStatus::NotHalal),
            "unclear" => Some(VerdictStatus::Unclear),
            _ => None,
        }
    }
}

/// How the verdict was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    CertificationVerified,
    AiAnalysis,
    RulesEngine,
    InsufficientData,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::CertificationVerified => "certification_verified",
            AnalysisMethod::AiAnalysis => "ai_analysis",
            AnalysisMethod::RulesEngine => "rules_engine",
            AnalysisMethod::InsufficientData => "insufficient_data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "certification_verified" => Some(AnalysisMethod::CertificationVerified),
            "ai_analysis" => Some(AnalysisMethod::AiAnalysis),
            "rules_engine" => Some(AnalysisMethod::RulesEngine),
            "insufficient_data" => Some(AnalysisMethod::InsufficientData),
            _ => None,
        }
    }
}

/// Outcome category of a single registry probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    NotFound,
    Error,
    Timeout,
}

/// One entry per registry probed, recorded regardless of outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationCheckResult {
    pub registry_name: String,
    pub country: String,
    pub checked: bool,
    pub found: bool,
    pub response_time_ms: u64,
    pub status: CheckStatus,
}

impl CertificationCheckResult {
    pub fn new(
        registry_name: &str,
        country: &str,
        found: bool,
        status: CheckStatus,
        response_time_ms: u64,
    ) -> Self {
        Self {
            registry_name: registry_name.to_string(),
            country: country.to_string(),
            checked: true,
            found,
            response_time_ms,
            status,
        }
    }

    pub fn timed_out(registry_name: &str, country: &str, response_time_ms: u64) -> Self {
        Self::new(registry_name, country, false, CheckStatus::Timeout, response_time_ms)
    }
}

/// Aggregate result of the certification fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationOutcome {
    pub is_certified: bool,
    pub cert_body: Option<String>,
    pub cert_country: Option<String>,
    pub cert_link: Option<String>,
    pub confidence_score: u8,
    pub external_source: Option<String>,
    /// Every probe's result, preserved for transparency even on a miss
    pub check_details: Vec<CertificationCheckResult>,
}

impl CertificationOutcome {
    pub fn not_certified(check_details: Vec<CertificationCheckResult>) -> Self {
        Self {
            is_certified: false,
            cert_body: None,
            cert_country: None,
            cert_link: None,
            confidence_score: 0,
            external_source: None,
            check_details,
        }
    }
}

/// Persisted verdict row, at most one per barcode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub id: Uuid,
    pub barcode: String,
    #[serde(rename = "verdict")]
    pub status: VerdictStatus,
    pub confidence_score: u8,
    pub analysis_notes: String,
    pub flagged_ingredients: Option<Vec<String>>,
    pub is_certified: bool,
    pub cert_body: Option<String>,
    pub cert_country: Option<String>,
    pub cert_link: Option<String>,
    pub analysis_method: AnalysisMethod,
    pub external_source: Option<String>,
    /// Raw model completion, kept for audit
    pub ai_explanation: Option<String>,
    pub check_details: Vec<CertificationCheckResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl Verdict {
    fn base(barcode: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            barcode: barcode.to_string(),
            status: VerdictStatus::Unclear,
            confidence_score: 0,
            analysis_notes: String::new(),
            flagged_ingredients: None,
            is_certified: false,
            cert_body: None,
            cert_country: None,
            cert_link: None,
            analysis_method: AnalysisMethod::RulesEngine,
            external_source: None,
            ai_explanation: None,
            check_details: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
            last_verified_at: None,
        }
    }

    /// Verdict backed by a certification hit
    ///
    /// Certification evidence takes strict precedence over ingredient
    /// inference, so the status is always `halal`.
    pub fn certified(barcode: &str, outcome: &CertificationOutcome) -> Self {
        let cert_body = outcome
            .cert_body
            .clone()
            .unwrap_or_else(|| "a recognized certification body".to_string());
        let cert_country = outcome
            .cert_country
            .clone()
            .unwrap_or_else(|| "the region".to_string());
        Self {
            status: VerdictStatus::Halal,
            confidence_score: outcome.confidence_score,
            analysis_notes: format!(
                "Product is certified halal by {} in {}.",
                cert_body, cert_country
            ),
            is_certified: true,
            cert_body: outcome.cert_body.clone(),
            cert_country: outcome.cert_country.clone(),
            cert_link: outcome.cert_link.clone(),
            analysis_method: AnalysisMethod::CertificationVerified,
            external_source: outcome.external_source.clone(),
            check_details: outcome.check_details.clone(),
            ..Self::base(barcode)
        }
    }

    /// Verdict derived from the AI ingredient analysis
    ///
    /// The AI `questionable` category persists as `unclear`.
    pub fn from_ai(
        barcode: &str,
        analysis: &AiAnalysis,
        check_details: Vec<CertificationCheckResult>,
    ) -> Self {
        Self {
            status: analysis.verdict.into(),
            confidence_score: analysis.confidence_score,
            analysis_notes: analysis.analysis_notes.clone(),
            flagged_ingredients: Some(analysis.flagged_ingredients.clone()),
            analysis_method: AnalysisMethod::AiAnalysis,
            external_source: Some("open_food_facts".to_string()),
            ai_explanation: Some(analysis.raw_model_output.clone()),
            check_details,
            ..Self::base(barcode)
        }
    }

    /// Verdict for a product with no usable ingredient data
    pub fn insufficient_data(
        barcode: &str,
        check_details: Vec<CertificationCheckResult>,
    ) -> Self {
        Self {
            status: VerdictStatus::Unclear,
            confidence_score: 0,
            analysis_notes: "Ingredients data not available in the Open Food Facts database. \
                             Please check the product packaging or contact the manufacturer \
                             for ingredient information."
                .to_string(),
            analysis_method: AnalysisMethod::InsufficientData,
            external_source: Some("open_food_facts".to_string()),
            check_details,
            ..Self::base(barcode)
        }
    }

    /// Degraded verdict used when no AI classifier is configured
    pub fn rules_fallback(
        barcode: &str,
        check_details: Vec<CertificationCheckResult>,
    ) -> Self {
        Self {
            status: VerdictStatus::Unclear,
            confidence_score: 50,
            analysis_notes: "Automated analysis".to_string(),
            analysis_method: AnalysisMethod::RulesEngine,
            external_source: Some("open_food_facts".to_string()),
            check_details,
            ..Self::base(barcode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [VerdictStatus::Halal, VerdictStatus::NotHalal, VerdictStatus::Unclear] {
            assert_eq!(VerdictStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VerdictStatus::parse("questionable"), None);
    }

    #[test]
    fn test_certified_verdict_invariants() {
        let outcome = CertificationOutcome {
            is_certified: true,
            cert_body: Some("JAKIM".to_string()),
            cert_country: Some("Malaysia".to_string()),
            cert_link: Some("https://example.test/1".to_string()),
            confidence_score: 95,
            external_source: Some("jakim".to_string()),
            check_details: vec![],
        };
        let verdict = Verdict::certified("12345678", &outcome);
        assert_eq!(verdict.status, VerdictStatus::Halal);
        assert!(verdict.is_certified);
        assert_eq!(verdict.analysis_method, AnalysisMethod::CertificationVerified);
        assert!(verdict.analysis_notes.contains("JAKIM"));
        assert!(verdict.analysis_notes.contains("Malaysia"));
    }

    #[test]
    fn test_insufficient_data_invariants() {
        let verdict = Verdict::insufficient_data("12345678", vec![]);
        assert_eq!(verdict.status, VerdictStatus::Unclear);
        assert_eq!(verdict.confidence_score, 0);
        assert_eq!(verdict.analysis_method, AnalysisMethod::InsufficientData);
    }
}
