// src/main.rs
//! Curator binary: one pipeline run per invocation.
//! Schedule it with cron/systemd; see `config/curator.toml` for settings.

use std::path::PathBuf;
use std::process::ExitCode;

use ds_news_curator::metrics::Metrics;
use ds_news_curator::{pipeline_from_config, CuratorConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_LOG_FORMAT: &str = "CURATOR_LOG_FORMAT";
const ENV_METRICS_PATH: &str = "CURATOR_METRICS_PATH";

/// Compact logs by default, JSON lines with `CURATOR_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ds_news_curator=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match CuratorConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "metrics recorder not installed");
            None
        }
    };

    let pipeline = match pipeline_from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to build pipeline");
            return ExitCode::from(2);
        }
    };

    let result = pipeline.run().await;

    if let (Some(m), Ok(path)) = (metrics.as_ref(), std::env::var(ENV_METRICS_PATH)) {
        if let Err(e) = m.write_to(&PathBuf::from(&path)).await {
            warn!(error = %format!("{e:#}"), path = %path, "writing metrics failed");
        }
    }

    match result {
        Ok(report) => {
            info!(
                outcome = ?report.outcome,
                articles = report.articles.len(),
                translation_fallbacks = report.stats.translation_fallbacks,
                summary_fallbacks = report.stats.summary_fallbacks,
                "curation run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "curation run failed");
            ExitCode::FAILURE
        }
    }
}
