// tests/persist_json.rs
use chrono::{TimeZone, Utc};
use ds_news_curator::collect::StaticCollector;
use ds_news_curator::dedup::{HistoryStore, JsonFileHistoryStore};
use ds_news_curator::persist::{JsonFileSink, RunRecord, RECORD_SCHEMA_VERSION};
use ds_news_curator::{Article, Enrichment, Pipeline, PipelineConfig, RunOutcome, SourceTag};
use std::sync::Arc;

fn articles() -> Vec<Article> {
    vec![
        Article::new(
            "wire",
            "https://wire.test/a?utm_source=rss",
            "Lab releases an open model",
            "The lab released weights and a technical report. ".repeat(15),
            SourceTag::NewsMedia,
        )
        .language("en"),
        Article::new(
            "kr_blog",
            "https://blog.kr.test/b",
            "시계열 예측 모델 운영 사례",
            "대규모 트래픽 환경에서 시계열 예측 모델을 운영한 경험을 공유합니다. ".repeat(10),
            SourceTag::PracticalBlog,
        )
        .language("ko"),
    ]
}

#[tokio::test]
async fn run_writes_latest_archive_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 15, 6, 0, 0).unwrap();
    let history = Arc::new(JsonFileHistoryStore::new(dir.path().join("history.json")));
    let sink = Arc::new(JsonFileSink::new(dir.path()));

    let p = Pipeline::new(PipelineConfig::defaults().unwrap(), history.clone(), sink.clone())
        .with_collector(Box::new(StaticCollector::new("fixed", articles())));
    let report = p.run_at(now).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);

    let latest = std::fs::read(sink.latest_path()).unwrap();
    let archive = std::fs::read(dir.path().join("articles_2024-05-15.json")).unwrap();
    assert_eq!(latest, archive);

    let rec: RunRecord = serde_json::from_slice(&latest).unwrap();
    assert_eq!(rec.schema_version, RECORD_SCHEMA_VERSION);
    assert_eq!(rec.generated_at, now);
    assert_eq!(rec.articles.len(), 2);
    assert_eq!(rec.articles, report.articles);
    assert_eq!(rec.stats.selected, 2);

    // Korean article needs no translation; English one falls back (no provider)
    let kr = rec.articles.iter().find(|a| a.source_id == "kr_blog").unwrap();
    assert_eq!(kr.translation, Enrichment::NotNeeded);
    let en = rec.articles.iter().find(|a| a.source_id == "wire").unwrap();
    assert!(en.translation.is_fallback());
    assert!(rec.articles.iter().all(|a| a.summary.is_some()));

    // raw JSON carries the public field names
    let raw: serde_json::Value = serde_json::from_slice(&latest).unwrap();
    assert_eq!(raw["outcome"], "completed");
    assert_eq!(raw["articles"][0]["tag"], "news-media");

    let saved = history.load().await.unwrap();
    assert_eq!(saved.len(), 2);
    assert!(!dir.path().join("history.json.tmp").exists());
}

#[tokio::test]
async fn history_file_survives_between_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 15, 6, 0, 0).unwrap();
    let build = || {
        Pipeline::new(
            PipelineConfig::defaults().unwrap(),
            Arc::new(JsonFileHistoryStore::new(dir.path().join("history.json"))),
            Arc::new(JsonFileSink::new(dir.path())),
        )
        .with_collector(Box::new(StaticCollector::new("fixed", articles())))
    };

    let first = build().run_at(now).await.unwrap();
    assert_eq!(first.articles.len(), 2);

    let second = build()
        .run_at(now + chrono::Duration::days(1))
        .await
        .unwrap();
    assert_eq!(second.outcome, RunOutcome::NoneSelected);
    assert_eq!(second.stats.dedup_rejected, 2);
    assert!(dir.path().join("articles_2024-05-16.json").exists());
}
