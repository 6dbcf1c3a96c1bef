// tests/metrics.rs
#![cfg(feature = "strict-metrics")]
use ds_news_curator::collect::StaticCollector;
use ds_news_curator::dedup::MemoryHistoryStore;
use ds_news_curator::enrich::{MockMode, MockProvider};
use ds_news_curator::metrics::{self, Metrics};
use ds_news_curator::persist::MemorySink;
use ds_news_curator::{Article, Pipeline, PipelineConfig, SourceTag};
use std::sync::Arc;

#[tokio::test]
async fn run_exposes_pipeline_series() {
    // Install the recorder for this test binary
    let m = Metrics::install().expect("recorder");

    let articles: Vec<Article> = (0..6)
        .map(|i| {
            Article::new(
                "wire",
                format!("https://wire.test/{i}"),
                format!("Story {i}"),
                "A sentence about serving models at scale. ".repeat(15),
                SourceTag::NewsMedia,
            )
            .language("en")
        })
        .collect();
    let failing = Arc::new(MockProvider::new(MockMode::Fail));
    let p = Pipeline::new(
        PipelineConfig::defaults().unwrap(),
        Arc::new(MemoryHistoryStore::new()),
        Arc::new(MemorySink::new()),
    )
    .with_collector(Box::new(StaticCollector::new("wire", articles)))
    .with_translator(failing.clone())
    .with_summarizer(failing);
    p.run().await.unwrap();

    let out = m.render();
    for name in [
        metrics::COLLECTED_TOTAL,
        metrics::SELECTED_TOTAL,
        metrics::PROVIDER_CALLS_TOTAL,
        metrics::PROVIDER_FAILURES_TOTAL,
        metrics::KILLSWITCH_TRIPS_TOTAL,
        metrics::LAST_RUN_TS,
    ] {
        assert!(out.contains(name), "missing {name} in:\n{out}");
    }
    assert!(out.contains("curator_stage_ms"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curator.prom");
    m.write_to(&path).await.unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains("curator_collected_total"));
}
