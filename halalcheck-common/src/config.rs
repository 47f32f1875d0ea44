//! Configuration resolution for halalcheck services
//!
//! Provides two-tier configuration resolution with ENV -> TOML priority.
//! The AI gateway credential is optional: when it is absent the service
//! starts without the AI classifier and answers ingredient-analysis
//! requests with 503.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_AI_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5730";
pub const DEFAULT_DATABASE_FILE: &str = "halalcheck.db";

/// TOML configuration file contents
///
/// All fields optional; environment variables take priority over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub ai_api_key: Option<String>,
    pub ai_gateway_url: Option<String>,
    pub ai_model: Option<String>,
    pub database_path: Option<String>,
    pub bind_addr: Option<String>,
}

impl TomlConfig {
    /// Load the TOML config file, returning defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Default config file location: `~/.config/halalcheck/halalcheck.toml`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("halalcheck")
            .join("halalcheck.toml")
    }
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the AI gateway API key from 2-tier configuration
///
/// **Priority:** ENV -> TOML
///
/// Returns `None` when no valid key is configured; the caller decides
/// whether that is fatal (it is not for the verdict pipeline, which
/// degrades to the rules-engine mode).
pub fn resolve_ai_api_key(toml_config: &TomlConfig) -> Option<String> {
    let mut sources = Vec::new();

    let env_key = std::env::var("HALALCHECK_AI_API_KEY").ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    let toml_key = toml_config.ai_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    if sources.len() > 1 {
        warn!(
            "AI gateway API key found in multiple sources: {}. Using environment (highest priority).",
            sources.join(", ")
        );
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("AI gateway API key loaded from environment variable");
            return Some(key.trim().to_string());
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("AI gateway API key loaded from TOML config");
            return Some(key.trim().to_string());
        }
    }

    warn!(
        "AI gateway API key not configured. Ingredient analysis is disabled. Configure using one of:\n\
         1. Environment: HALALCHECK_AI_API_KEY=your-key-here\n\
         2. TOML config: ~/.config/halalcheck/halalcheck.toml (ai_api_key = \"your-key\")"
    );
    None
}

/// Resolve a plain string setting with ENV -> TOML -> default priority.
fn resolve_setting(env_var: &str, toml_value: Option<&String>, default: &str) -> String {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    if let Some(value) = toml_value {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    default.to_string()
}

/// Resolve the AI gateway URL (ENV -> TOML -> built-in default).
pub fn resolve_ai_gateway_url(toml_config: &TomlConfig) -> String {
    resolve_setting(
        "HALALCHECK_AI_GATEWAY_URL",
        toml_config.ai_gateway_url.as_ref(),
        DEFAULT_AI_GATEWAY_URL,
    )
}

/// Resolve the AI model identifier (ENV -> TOML -> built-in default).
pub fn resolve_ai_model(toml_config: &TomlConfig) -> String {
    resolve_setting(
        "HALALCHECK_AI_MODEL",
        toml_config.ai_model.as_ref(),
        DEFAULT_AI_MODEL,
    )
}

/// Resolve the SQLite database path (ENV -> TOML -> `halalcheck.db` in cwd).
pub fn resolve_database_path(toml_config: &TomlConfig) -> PathBuf {
    PathBuf::from(resolve_setting(
        "HALALCHECK_DATABASE_PATH",
        toml_config.database_path.as_ref(),
        DEFAULT_DATABASE_FILE,
    ))
}

/// Resolve the server bind address (ENV -> TOML -> `127.0.0.1:5730`).
pub fn resolve_bind_addr(toml_config: &TomlConfig) -> String {
    resolve_setting(
        "HALALCHECK_BIND_ADDR",
        toml_config.bind_addr.as_ref(),
        DEFAULT_BIND_ADDR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        std::env::set_var("HALALCHECK_AI_MODEL", "env-model");
        let toml = TomlConfig {
            ai_model: Some("toml-model".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_ai_model(&toml), "env-model");
        std::env::remove_var("HALALCHECK_AI_MODEL");
    }

    #[test]
    #[serial]
    fn test_toml_used_when_env_absent() {
        std::env::remove_var("HALALCHECK_AI_MODEL");
        let toml = TomlConfig {
            ai_model: Some("toml-model".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_ai_model(&toml), "toml-model");
    }

    #[test]
    #[serial]
    fn test_defaults_when_unconfigured() {
        std::env::remove_var("HALALCHECK_AI_GATEWAY_URL");
        std::env::remove_var("HALALCHECK_AI_MODEL");
        std::env::remove_var("HALALCHECK_BIND_ADDR");
        let toml = TomlConfig::default();
        assert_eq!(resolve_ai_gateway_url(&toml), DEFAULT_AI_GATEWAY_URL);
        assert_eq!(resolve_ai_model(&toml), DEFAULT_AI_MODEL);
        assert_eq!(resolve_bind_addr(&toml), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = TomlConfig::load(Path::new("/nonexistent/halalcheck.toml")).unwrap();
        assert!(config.ai_api_key.is_none());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halalcheck.toml");
        std::fs::write(&path, "ai_model = \"test-model\"\nbind_addr = \"0.0.0.0:8080\"\n")
            .unwrap();
        let config = TomlConfig::load(&path).unwrap();
        assert_eq!(config.ai_model.as_deref(), Some("test-model"));
        assert_eq!(config.bind_addr.as_deref(), Some("0.0.0.0:8080"));
    }
}
