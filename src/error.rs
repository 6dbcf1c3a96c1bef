// src/error.rs
//! Error taxonomy.
//!
//! Configuration problems surface at load time as [`ConfigError`]. A run
//! fails with [`PipelineError`] only for deterministic logic defects, history
//! store failures and persistence failures. Provider failures never reach
//! this layer; the orchestrator turns them into fallback data.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config path from {var} does not exist: {path}")]
    MissingPath { var: &'static str, path: PathBuf },

    #[error("keyword rule #{index} has an empty pattern")]
    EmptyPattern { index: usize },

    #[error("keyword rule {pattern:?} has a non-finite weight")]
    NonFiniteWeight { pattern: String },

    #[error("keyword rule {pattern:?} declared twice with conflicting weights ({first} vs {second})")]
    ConflictingRule {
        pattern: String,
        first: f64,
        second: f64,
    },

    #[error("invalid tier proportions: {0}")]
    InvalidProportions(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("missing {var} env var for provider {provider}")]
    MissingApiKey {
        var: &'static str,
        provider: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Pipeline stage names used in logs, metrics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Dedup,
    Score,
    Select,
    Translate,
    Summarize,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Dedup => "dedup",
            Stage::Score => "score",
            Stage::Select => "select",
            Stage::Translate => "translate",
            Stage::Summarize => "summarize",
            Stage::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A defect in pure pipeline logic (dedup/scoring/selection). Fatal to the run.
    #[error("logic error in {stage} stage: {detail}")]
    Logic { stage: Stage, detail: String },

    #[error("history store: {0:#}")]
    History(anyhow::Error),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl PipelineError {
    pub(crate) fn logic(stage: Stage, detail: impl Into<String>) -> Self {
        PipelineError::Logic {
            stage,
            detail: detail.into(),
        }
    }
}
