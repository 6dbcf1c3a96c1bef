// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod collect;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use article::{Article, Enrichment, FallbackReason, SourceTag, TierMap};
pub use config::{CuratorConfig, PipelineConfig};
pub use error::{ConfigError, PipelineError, Stage};
pub use pipeline::{Pipeline, RunOutcome, RunReport, RunStats};

use std::sync::Arc;

use crate::collect::{Collector, RssCollector};
use crate::dedup::JsonFileHistoryStore;
use crate::enrich::build_providers;
use crate::persist::JsonFileSink;

/// Wire a file-backed pipeline from a loaded config: RSS collectors for every
/// enabled source, providers per `[provider]`, history and run records under
/// `storage.data_dir`.
pub fn pipeline_from_config(cfg: &CuratorConfig) -> anyhow::Result<Pipeline> {
    let pipeline_cfg = cfg.pipeline()?;
    let providers = build_providers(&cfg.provider, &cfg.enrichment)?;

    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    for spec in cfg.source_catalog().into_iter().filter(|s| s.enabled) {
        collectors.push(Box::new(RssCollector::from_spec(spec)?));
    }

    let history = Arc::new(JsonFileHistoryStore::new(cfg.storage.history_path()));
    let sink = Arc::new(JsonFileSink::new(cfg.storage.data_dir.clone()));
    Ok(Pipeline::new(pipeline_cfg, history, sink)
        .with_collectors(collectors)
        .with_providers(providers))
}
