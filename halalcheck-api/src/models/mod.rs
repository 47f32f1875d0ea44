//! Data model for the verdict resolution pipeline

pub mod analysis;
pub mod product;
pub mod verdict;

pub use analysis::{AiAnalysis, AiVerdict, AnalysisRequest, IngredientsInput};
pub use product::{ProductRecord, ProductSummary};
pub use verdict::{
    AnalysisMethod, CertificationCheckResult, CertificationOutcome, CheckStatus, Verdict,
    VerdictStatus,
};
