// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

pub const COLLECTED_TOTAL: &str = "curator_collected_total";
pub const COLLECTOR_ERRORS_TOTAL: &str = "curator_collector_errors_total";
pub const DEDUP_REJECTED_TOTAL: &str = "curator_dedup_rejected_total";
pub const SELECTED_TOTAL: &str = "curator_selected_total";
pub const PROVIDER_CALLS_TOTAL: &str = "curator_provider_calls_total";
pub const PROVIDER_FAILURES_TOTAL: &str = "curator_provider_failures_total";
pub const KILLSWITCH_TRIPS_TOTAL: &str = "curator_killswitch_trips_total";
pub const STAGE_MS: &str = "curator_stage_ms";
pub const LAST_RUN_TS: &str = "curator_last_run_ts";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(COLLECTED_TOTAL, "Articles returned by collectors.");
        describe_counter!(COLLECTOR_ERRORS_TOTAL, "Collectors that reported an error.");
        describe_counter!(
            DEDUP_REJECTED_TOTAL,
            "Articles rejected as already seen (URL identity or similar title)."
        );
        describe_counter!(SELECTED_TOTAL, "Articles in the final selection.");
        describe_counter!(
            PROVIDER_CALLS_TOTAL,
            "Enrichment provider calls made, by provider and stage."
        );
        describe_counter!(
            PROVIDER_FAILURES_TOTAL,
            "Enrichment provider calls that failed or timed out."
        );
        describe_counter!(
            KILLSWITCH_TRIPS_TOTAL,
            "Providers disabled mid-run by the kill switch."
        );
        describe_histogram!(STAGE_MS, "Stage wall time in milliseconds.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when the pipeline last finished a run.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition text to `path` (textfile-collector style).
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        crate::persist::write_atomic(path, self.render().as_bytes()).await
    }
}
