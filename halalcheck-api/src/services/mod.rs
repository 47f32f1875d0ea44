//! Service components of the verdict resolution pipeline

pub mod ai_classifier;
pub mod certification;
pub mod off_client;
pub mod orchestrator;
pub mod product_fetcher;
pub mod rate_limiter;
pub mod validation;

pub use ai_classifier::{AiClassifier, AiError, AnalysisResult};
pub use certification::{CertificationProbe, FanOutChecker, ProbeOutcome, RegistryProbe, VerifyHalalProbe};
pub use off_client::{OffClient, OffError};
pub use orchestrator::{LookupOutcome, OrchestratorError, VerdictOrchestrator};
pub use product_fetcher::ProductDataFetcher;
pub use rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use validation::ValidationError;
