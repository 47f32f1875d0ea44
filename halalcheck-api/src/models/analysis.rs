//! AI ingredient-analysis types

use serde::{Deserialize, Serialize};

use crate::models::verdict::VerdictStatus;

/// Verdict categories the language model is asked to choose between
///
/// `questionable` is the mashbooh (doubtful) category; it maps to the
/// persisted `unclear` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiVerdict {
    Halal,
    NotHalal,
    Questionable,
}

impl From<AiVerdict> for VerdictStatus {
    fn from(verdict: AiVerdict) -> Self {
        match verdict {
            AiVerdict::Halal => VerdictStatus::Halal,
            AiVerdict::NotHalal => VerdictStatus::NotHalal,
            AiVerdict::Questionable => VerdictStatus::Unclear,
        }
    }
}

/// Structured result of one ingredient analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub verdict: AiVerdict,
    /// 0-100, higher means more certain
    pub confidence_score: u8,
    pub flagged_ingredients: Vec<String>,
    pub analysis_notes: String,
    pub recommendations: Option<String>,
    /// Full model completion, preserved for audit even when the
    /// structured parse failed
    pub raw_model_output: String,
}

/// Ingredient payload: either a structured list or the raw label text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientsInput {
    List(Vec<String>),
    Text(String),
}

impl IngredientsInput {
    pub fn is_empty(&self) -> bool {
        match self {
            IngredientsInput::List(items) => items.iter().all(|i| i.trim().is_empty()),
            IngredientsInput::Text(text) => text.trim().is_empty(),
        }
    }

    /// Flatten to the comma-joined form used in the model prompt
    pub fn joined(&self) -> String {
        match self {
            IngredientsInput::List(items) => items.join(", "),
            IngredientsInput::Text(text) => text.clone(),
        }
    }
}

/// Input to the AI Ingredient Classifier
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub region: String,
    pub ingredients: IngredientsInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questionable_maps_to_unclear() {
        assert_eq!(VerdictStatus::from(AiVerdict::Questionable), VerdictStatus::Unclear);
        assert_eq!(VerdictStatus::from(AiVerdict::Halal), VerdictStatus::Halal);
        assert_eq!(VerdictStatus::from(AiVerdict::NotHalal), VerdictStatus::NotHalal);
    }

    #[test]
    fn test_ingredients_input_emptiness() {
        assert!(IngredientsInput::Text("   ".to_string()).is_empty());
        assert!(IngredientsInput::List(vec![]).is_empty());
        assert!(IngredientsInput::List(vec!["".to_string()]).is_empty());
        assert!(!IngredientsInput::Text("water".to_string()).is_empty());
    }

    #[test]
    fn test_untagged_deserialization() {
        let list: IngredientsInput = serde_json::from_str(r#"["water", "sugar"]"#).unwrap();
        assert!(matches!(list, IngredientsInput::List(ref v) if v.len() == 2));
        let text: IngredientsInput = serde_json::from_str(r#""water, sugar""#).unwrap();
        assert!(matches!(text, IngredientsInput::Text(_)));
    }
}
