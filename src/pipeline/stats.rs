// src/pipeline/stats.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enrich::ProviderStats;
use crate::error::Stage;

/// How a run ended. Every variant is a valid outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every stage ran and no provider was disabled.
    Completed,
    /// Finished, but a kill switch tripped or the run deadline expired.
    Degraded,
    /// Articles were collected but none survived selection. Still persisted.
    NoneSelected,
    /// Collectors returned nothing. Nothing persisted, history untouched.
    NothingCollected,
}

/// Counters for one run. Owned by the orchestrator, reported at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub collected: usize,
    pub collector_errors: usize,
    pub history_loaded: usize,
    pub history_pruned: usize,
    pub dedup_rejected: usize,
    pub dedup_similar_title: usize,
    /// Accepted articles without a usable URL.
    pub dedup_unkeyed: usize,
    pub deduplicated: usize,
    pub below_threshold: usize,
    pub selected: usize,
    pub redistributed: usize,
    pub translated: usize,
    pub translation_fallbacks: usize,
    pub summarized: usize,
    pub summary_fallbacks: usize,
    pub deadline_expired: bool,
    pub providers: Vec<ProviderStats>,
    /// Wall time per stage in milliseconds.
    pub stage_ms: BTreeMap<String, u64>,
}

impl RunStats {
    pub(crate) fn record_stage(&mut self, stage: Stage, ms: u64) {
        self.stage_ms.insert(stage.as_str().to_string(), ms);
    }

    pub fn any_provider_tripped(&self) -> bool {
        self.providers.iter().any(|p| p.tripped)
    }
}
