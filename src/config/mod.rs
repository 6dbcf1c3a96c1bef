// src/config/mod.rs
//! Curator configuration: a single TOML document validated at load time.
//!
//! Lookup order for [`CuratorConfig::load_default`]:
//! 1) `$CURATOR_CONFIG_PATH` (must exist)
//! 2) `config/curator.toml`
//! 3) built-in defaults
//!
//! Validation (rule conflicts, proportions, ranges) runs once here; nothing in
//! the pipeline re-reads configuration mid-run.

pub mod provider;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collect::sources::{default_catalog, SourceSpec};
use crate::dedup::DedupConfig;
use crate::enrich::EnrichmentConfig;
use crate::error::ConfigError;
use crate::scoring::rules::{ScoringConfig, ScoringRules};
use crate::scoring::select::SelectionConfig;

pub use provider::{ProviderConfig, ProviderKind};

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `articles.json`, dated archives and `history.json`.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }
}

/// Raw configuration document as written in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    pub dedup: DedupConfig,
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub enrichment: EnrichmentConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub sources: Vec<SourceSpec>,
}

/// Validated settings the pipeline orchestrator is constructed with.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dedup: DedupConfig,
    pub rules: ScoringRules,
    pub selection: SelectionConfig,
    pub enrichment: EnrichmentConfig,
}

impl PipelineConfig {
    /// Built-in defaults, already validated.
    pub fn defaults() -> Result<Self, ConfigError> {
        CuratorConfig::default().pipeline()
    }
}

impl CuratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: CuratorConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&content)?;
        info!(target: "config", path = %path.display(), rules = cfg.scoring.rules.len(), "config loaded");
        Ok(cfg)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingPath {
                    var: ENV_CONFIG_PATH,
                    path: pb,
                });
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        info!(target: "config", "no config file found, using built-in defaults");
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every section. Called by the loaders; exposed for callers that
    /// build a config in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dedup.validate()?;
        ScoringRules::compile(&self.scoring)?;
        self.selection.validate()?;
        self.enrichment.validate()?;
        self.provider.validate()?;
        for s in &self.sources {
            s.validate()?;
        }
        Ok(())
    }

    /// Compile the sections the orchestrator needs.
    pub fn pipeline(&self) -> Result<PipelineConfig, ConfigError> {
        self.dedup.validate()?;
        self.selection.validate()?;
        self.enrichment.validate()?;
        Ok(PipelineConfig {
            dedup: self.dedup.clone(),
            rules: ScoringRules::compile(&self.scoring)?,
            selection: self.selection.clone(),
            enrichment: self.enrichment.clone(),
        })
    }

    /// Configured sources, or the built-in catalog when none are listed.
    pub fn source_catalog(&self) -> Vec<SourceSpec> {
        if self.sources.is_empty() {
            default_catalog()
        } else {
            self.sources.clone()
        }
    }
}
