//! Service configuration for halalcheck-api
//!
//! Gathers the resolved settings into one struct at startup. Resolution
//! priority is ENV -> TOML -> built-in default (see halalcheck-common).

use halalcheck_common::config::{self, TomlConfig};
use halalcheck_common::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// AI gateway credential; `None` disables the classifier and degrades
    /// uncertified lookups to the rules-engine verdict
    pub ai_api_key: Option<String>,
    pub ai_gateway_url: String,
    pub ai_model: String,
    pub database_path: PathBuf,
    pub bind_addr: String,
}

impl ServiceConfig {
    /// Load configuration from the default TOML location and environment
    pub fn load() -> Result<Self> {
        let toml_config = TomlConfig::load(&TomlConfig::default_path())?;
        Ok(Self::from_toml(&toml_config))
    }

    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        Self {
            ai_api_key: config::resolve_ai_api_key(toml_config),
            ai_gateway_url: config::resolve_ai_gateway_url(toml_config),
            ai_model: config::resolve_ai_model(toml_config),
            database_path: config::resolve_database_path(toml_config),
            bind_addr: config::resolve_bind_addr(toml_config),
        }
    }
}
