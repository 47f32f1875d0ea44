//! AI ingredient classifier
//!
//! Issues one chat-completion request against an OpenAI-compatible gateway
//! and parses the completion into a structured analysis. The model is asked
//! for JSON but is not trusted to return it: the parser locates the first
//! balanced `{...}` span and falls back to a `questionable` analysis when
//! no usable JSON is present. The raw completion is always retained.
//!
//! Gateway 429 and 402 are surfaced as distinct errors (retry-later vs.
//! quota exhausted). No retry happens inside this component; the user
//! re-triggers the analysis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{AiAnalysis, AiVerdict, AnalysisRequest};
use crate::types::IngredientClassifier;

const REQUEST_TEMPERATURE: f32 = 0.3;
const FALLBACK_CONFIDENCE: u8 = 50;

/// AI gateway errors
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("AI gateway rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("AI credits exhausted. Please add credits to continue.")]
    QuotaExhausted,

    #[error("AI gateway error {0}: {1}")]
    Upstream(u16, String),

    #[error("AI gateway returned an empty completion")]
    EmptyCompletion,
}

/// Chat completion request/response wire types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Strictly decoded analysis object from the model completion
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAnalysis {
    pub verdict: AiVerdict,
    #[serde(default = "default_confidence")]
    pub confidence_score: u8,
    #[serde(default)]
    pub flagged_ingredients: Vec<String>,
    #[serde(default)]
    pub analysis_notes: String,
    #[serde(default)]
    pub recommendations: Option<String>,
}

fn default_confidence() -> u8 {
    FALLBACK_CONFIDENCE
}

/// Two-variant parse result: a strict decode, or the raw text fallback
#[derive(Debug, Clone)]
pub enum AnalysisResult {
    Structured(ParsedAnalysis),
    Fallback { raw: String },
}

impl AnalysisResult {
    /// Finalize into an `AiAnalysis`, retaining the raw completion either way
    pub fn into_analysis(self, raw_model_output: String) -> AiAnalysis {
        match self {
            AnalysisResult::Structured(parsed) => AiAnalysis {
                verdict: parsed.verdict,
                confidence_score: parsed.confidence_score.min(100),
                flagged_ingredients: parsed.flagged_ingredients,
                analysis_notes: parsed.analysis_notes,
                recommendations: parsed.recommendations,
                raw_model_output,
            },
            AnalysisResult::Fallback { raw } => AiAnalysis {
                verdict: AiVerdict::Questionable,
                confidence_score: FALLBACK_CONFIDENCE,
                flagged_ingredients: Vec::new(),
                analysis_notes: if raw.trim().is_empty() {
                    "Unable to parse AI response".to_string()
                } else {
                    raw
                },
                recommendations: Some("Manual verification recommended".to_string()),
                raw_model_output,
            },
        }
    }
}

/// AI gateway client
pub struct AiClassifier {
    http_client: reqwest::Client,
    gateway_url: String,
    api_key: String,
    model: String,
}

impl AiClassifier {
    pub fn new(gateway_url: String, api_key: String, model: String) -> Result<Self, AiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            gateway_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl IngredientClassifier for AiClassifier {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AiAnalysis, AiError> {
        let product_name = request.product_name.as_deref().unwrap_or("Unknown");
        tracing::info!(product_name = %product_name, "Analyzing ingredients");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(&request.region),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(request),
                },
            ],
            temperature: REQUEST_TEMPERATURE,
        };

        let response = self
            .http_client
            .post(&self.gateway_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(AiError::RateLimited);
        }
        if status.as_u16() == 402 {
            return Err(AiError::QuotaExhausted);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), error = %error_text, "AI gateway error");
            return Err(AiError::Upstream(status.as_u16(), error_text));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or(AiError::EmptyCompletion)?;

        let analysis = parse_analysis(&content).into_analysis(content);

        tracing::info!(
            verdict = ?analysis.verdict,
            confidence = analysis.confidence_score,
            flagged = analysis.flagged_ingredients.len(),
            "Ingredient analysis completed"
        );

        Ok(analysis)
    }
}

/// Instruction prompt encoding the halal compliance rule taxonomy
fn build_system_prompt(region: &str) -> String {
    format!(
        "You are a halal food certification expert. Analyze ingredients for halal compliance \
         according to Islamic dietary laws.\n\
         \n\
         Consider:\n\
         1. **Haram (Forbidden) Ingredients**: Pork, alcohol, blood, carnivorous animals, \
         insects (except locust/grasshopper), animals not slaughtered according to Islamic law\n\
         2. **E-Numbers**: Many E-numbers can be from animal or plant sources. Flag suspicious \
         ones (e.g., E120=carmine/insect, E441=gelatin, E542=bone phosphate, E471=mono/diglycerides \
         which could be animal-derived)\n\
         3. **Derivatives**: Animal fats, lard, enzymes (rennet, pepsin), gelatin, whey (if from \
         non-halal cheese), emulsifiers, glycerin\n\
         4. **Ambiguous Terms**: \"Natural flavors\", \"enzymes\", \"processing aids\" can hide \
         non-halal ingredients\n\
         5. **Regional Context**: Standards vary by region ({region})\n\
         \n\
         Return your analysis as a JSON object with:\n\
         - verdict: \"halal\", \"not_halal\", or \"questionable\"\n\
         - confidence_score: 0-100 (higher = more certain)\n\
         - flagged_ingredients: array of ingredient names that are problematic\n\
         - analysis_notes: detailed explanation of your verdict (2-3 sentences)\n\
         - recommendations: what to verify or look for on certification",
        region = region
    )
}

fn build_user_prompt(request: &AnalysisRequest) -> String {
    format!(
        "Product: {}\nBrand: {}\nRegion: {}\n\nIngredients:\n{}\n\n\
         Analyze these ingredients for halal compliance and return JSON only.",
        request.product_name.as_deref().unwrap_or("Unknown"),
        request.brand.as_deref().unwrap_or("Unknown"),
        request.region,
        request.ingredients.joined()
    )
}

/// Locate the first balanced `{...}` span in the completion text
///
/// Brace counting skips string literals so embedded quotes and escaped
/// braces do not unbalance the scan.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tolerant parse of the model completion
///
/// A strict decode of the first balanced JSON span wins; anything else
/// (no JSON span, malformed JSON, schema mismatch) falls back to a
/// `questionable` analysis carrying the raw text.
pub(crate) fn parse_analysis(content: &str) -> AnalysisResult {
    let Some(span) = extract_json_object(content) else {
        tracing::warn!("No JSON object found in AI completion, using fallback analysis");
        return AnalysisResult::Fallback {
            raw: content.to_string(),
        };
    };

    match serde_json::from_str::<ParsedAnalysis>(span) {
        Ok(parsed) => AnalysisResult::Structured(parsed),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse AI completion, using fallback analysis");
            AnalysisResult::Fallback {
                raw: content.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientsInput;

    #[test]
    fn test_extract_json_object_plain() {
        let text = r#"Here is my analysis: {"verdict": "halal"} hope it helps"#;
        assert_eq!(extract_json_object(text), Some(r#"{"verdict": "halal"}"#));
    }

    #[test]
    fn test_extract_json_object_nested_and_strings() {
        let text = r#"{"a": {"b": "with } brace"}, "c": "\" quote"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_object_absent() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("unbalanced { brace"), None);
    }

    #[test]
    fn test_parse_structured_analysis() {
        let content = r#"```json
{"verdict": "not_halal", "confidence_score": 92, "flagged_ingredients": ["gelatin"], "analysis_notes": "Contains pork gelatin."}
```"#;
        let analysis = parse_analysis(content).into_analysis(content.to_string());
        assert_eq!(analysis.verdict, AiVerdict::NotHalal);
        assert_eq!(analysis.confidence_score, 92);
        assert_eq!(analysis.flagged_ingredients, vec!["gelatin"]);
        assert_eq!(analysis.raw_model_output, content);
    }

    #[test]
    fn test_parse_prose_falls_back_to_questionable() {
        let prose = "I cannot say for certain whether this product is halal.";
        let analysis = parse_analysis(prose).into_analysis(prose.to_string());
        assert_eq!(analysis.verdict, AiVerdict::Questionable);
        assert_eq!(analysis.confidence_score, 50);
        assert!(analysis.flagged_ingredients.is_empty());
        assert_eq!(analysis.analysis_notes, prose);
        assert_eq!(analysis.raw_model_output, prose);
    }

    #[test]
    fn test_parse_malformed_json_falls_back() {
        let content = r#"{"verdict": "definitely-fine", "confidence_score": 92}"#;
        let analysis = parse_analysis(content).into_analysis(content.to_string());
        assert_eq!(analysis.verdict, AiVerdict::Questionable);
        assert_eq!(analysis.confidence_score, 50);
    }

    #[test]
    fn test_parse_defaults_missing_optional_fields() {
        let content = r#"{"verdict": "halal"}"#;
        let analysis = parse_analysis(content).into_analysis(content.to_string());
        assert_eq!(analysis.verdict, AiVerdict::Halal);
        assert_eq!(analysis.confidence_score, 50);
        assert!(analysis.analysis_notes.is_empty());
    }

    #[test]
    fn test_prompts_embed_context() {
        let request = AnalysisRequest {
            product_name: Some("Gummy Bears".to_string()),
            brand: Some("Sweetco".to_string()),
            region: "de".to_string(),
            ingredients: IngredientsInput::List(vec![
                "glucose syrup".to_string(),
                "gelatin".to_string(),
            ]),
        };
        let system = build_system_prompt(&request.region);
        assert!(system.contains("(de)"));
        let user = build_user_prompt(&request);
        assert!(user.contains("Gummy Bears"));
        assert!(user.contains("glucose syrup, gelatin"));
    }
}
