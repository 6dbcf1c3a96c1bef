// src/config/provider.rs
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::ConfigError;

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Mock,
    #[default]
    Disabled,
}

/// Enrichment provider settings (`[provider]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from `GEMINI_API_KEY`.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Second model tried for translation when the primary call fails.
    #[serde(default)]
    pub backup_model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            api_key: default_api_key(),
            backup_model: None,
        }
    }
}

impl ProviderConfig {
    pub const ENV_GEMINI_KEY: &'static str = "GEMINI_API_KEY";

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind == ProviderKind::Gemini && self.model.trim().is_empty() {
            return Err(ConfigError::invalid("provider.model", "must not be empty"));
        }
        if self.backup_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ConfigError::invalid("provider.backup_model", "must not be empty"));
        }
        Ok(())
    }

    /// Resolve the API key; "ENV" reads the provider's env var.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(self.api_key.trim().to_string());
        }
        match self.kind {
            ProviderKind::Gemini => env::var(Self::ENV_GEMINI_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or(ConfigError::MissingApiKey {
                    var: Self::ENV_GEMINI_KEY,
                    provider: "gemini".into(),
                }),
            ProviderKind::Mock | ProviderKind::Disabled => Ok(String::new()),
        }
    }
}
