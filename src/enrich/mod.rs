// src/enrich/mod.rs
//! Enrichment contracts: translation and summarization providers.
//!
//! Providers are external collaborators; the orchestrator is their only
//! caller and turns every error into fallback data.

pub mod gemini;
pub mod killswitch;
pub mod mock;
pub mod text;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ConfigError;

pub use gemini::GeminiProvider;
pub use killswitch::{ProviderGuard, ProviderStats};
pub use mock::{MockMode, MockProvider};

/// Translate `text` into the configured target language. Called only for text
/// that is not already in the target language. Must not mutate its input.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_lang_hint: Option<&str>) -> Result<String>;
    fn name(&self) -> &str;
}

/// Summarize `text` into about `sentences` sentences (best effort).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, sentences: usize) -> Result<String>;
    fn name(&self) -> &str;
}

pub type DynTranslator = Arc<dyn Translator>;
pub type DynSummarizer = Arc<dyn Summarizer>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Language articles are translated into.
    pub target_language: String,
    /// Upper bound on summary sentences.
    pub summary_sentences: usize,
    /// Bodies shorter than this are summarized locally.
    pub summary_min_body_chars: usize,
    /// Bodies longer than this are cut to half of it before translation.
    pub max_translate_chars: usize,
    pub call_timeout_ms: u64,
    /// Budget for both enrichment stages, counted from the start of
    /// translation. Collection time is not included. `0` disables it.
    pub run_deadline_secs: u64,
    /// In-flight provider calls per stage.
    pub concurrency: usize,
    /// Failure rate above which a provider is disabled for the run.
    pub kill_switch_rate: f64,
    /// Completed calls required before the rate is evaluated.
    pub kill_switch_min_calls: u32,
    /// Preferred renderings of technical terms, applied to translated text.
    pub glossary: BTreeMap<String, String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            target_language: "ko".to_string(),
            summary_sentences: 3,
            summary_min_body_chars: 50,
            max_translate_chars: 2000,
            call_timeout_ms: 20_000,
            run_deadline_secs: 600,
            concurrency: 2,
            kill_switch_rate: 0.5,
            kill_switch_min_calls: 4,
            glossary: BTreeMap::new(),
        }
    }
}

impl EnrichmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::invalid(
                "enrichment.target_language",
                "must not be empty",
            ));
        }
        if self.summary_sentences == 0 {
            return Err(ConfigError::invalid(
                "enrichment.summary_sentences",
                "must be >= 1",
            ));
        }
        if self.max_translate_chars < 2 {
            return Err(ConfigError::invalid(
                "enrichment.max_translate_chars",
                "must be >= 2",
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "enrichment.call_timeout_ms",
                "must be > 0",
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("enrichment.concurrency", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.kill_switch_rate) {
            return Err(ConfigError::invalid(
                "enrichment.kill_switch_rate",
                format!("{} is outside [0, 1]", self.kill_switch_rate),
            ));
        }
        if let Some((term, _)) = self.glossary.iter().find(|(_, to)| to.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "enrichment.glossary",
                format!("{term:?} has an empty replacement"),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        (self.run_deadline_secs > 0).then(|| Duration::from_secs(self.run_deadline_secs))
    }
}

/// Translator and summarizer handed to the orchestrator. `None` means the
/// stage always takes the local fallback. The backup translator is tried
/// when the primary one fails for an article.
pub struct Providers {
    pub translator: Option<DynTranslator>,
    pub backup_translator: Option<DynTranslator>,
    pub summarizer: Option<DynSummarizer>,
}

impl Providers {
    pub fn none() -> Self {
        Self {
            translator: None,
            backup_translator: None,
            summarizer: None,
        }
    }
}

/// Factory: build providers according to config and environment.
///
/// * `AI_TEST_MODE=mock` returns the deterministic mock provider.
/// * Else `kind = "disabled"` returns no providers.
/// * Else the configured remote provider, with its key resolved. A
///   `backup_model` adds a second translator on that model.
pub fn build_providers(
    provider: &ProviderConfig,
    enrichment: &EnrichmentConfig,
) -> Result<Providers, ConfigError> {
    let mock_env = std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    let kind = if mock_env {
        ProviderKind::Mock
    } else {
        provider.kind
    };
    match kind {
        ProviderKind::Disabled => Ok(Providers::none()),
        ProviderKind::Mock => {
            let mock = Arc::new(
                MockProvider::new(MockMode::Succeed)
                    .target_language(enrichment.target_language.clone()),
            );
            Ok(Providers {
                translator: Some(mock.clone()),
                backup_translator: None,
                summarizer: Some(mock),
            })
        }
        ProviderKind::Gemini => {
            let key = provider.resolve_api_key()?;
            let gemini_on = |model: &str| {
                GeminiProvider::new(
                    key.clone(),
                    model.to_string(),
                    enrichment.target_language.clone(),
                    enrichment.call_timeout(),
                )
                .map(Arc::new)
                .map_err(|e| ConfigError::invalid("provider", format!("{e:#}")))
            };
            let gemini = gemini_on(&provider.model)?;
            let backup: Option<DynTranslator> = match provider.backup_model.as_deref() {
                Some(m) => Some(gemini_on(m)?),
                None => None,
            };
            Ok(Providers {
                translator: Some(gemini.clone()),
                backup_translator: backup,
                summarizer: Some(gemini),
            })
        }
    }
}
