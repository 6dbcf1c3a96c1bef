// tests/collect_rss.rs
use chrono::{TimeZone, Utc};
use ds_news_curator::collect::rss::{parse_feed, FeedLimits};
use ds_news_curator::collect::{collect_all, Collector, RssCollector, SourceSpec, StaticCollector};
use ds_news_curator::SourceTag;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

fn practical() -> SourceSpec {
    SourceSpec::new(
        "practical_notes",
        "Practical ML Notes",
        "https://blog.practical.test/feed.xml",
        SourceTag::PracticalBlog,
        "en",
    )
}

fn company() -> SourceSpec {
    SourceSpec::new(
        "company_eng",
        "Engineering Blog",
        "https://eng.company.test/atom.xml",
        SourceTag::CompanyBlog,
        "ko",
    )
}

#[test]
fn rss_items_are_cleaned_and_filtered() {
    let now = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
    let items = parse_feed(
        &fixture("practical_rss.xml"),
        &practical(),
        now,
        FeedLimits::default(),
    )
    .unwrap();

    // untitled and 2019 entries are dropped
    let titles: Vec<&str> = items.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(items.len(), 3, "got {titles:?}");
    assert_eq!(titles[0], "How to serve an LLM on a single GPU");
    assert!(titles[1].starts_with("Forecasting demand"));
    assert_eq!(titles[2], "Undated reading list");

    let first = &items[0];
    assert_eq!(first.tag, SourceTag::PracticalBlog);
    assert_eq!(first.source_id, "practical_notes");
    assert_eq!(first.language.as_deref(), Some("en"));
    assert_eq!(first.keywords, vec!["LLM", "Serving"]);
    assert!(first.body.contains("quantization"));
    assert!(!first.body.contains('<'), "markup left in {:?}", first.body);
    assert_eq!(
        first.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 14, 8, 30, 0).unwrap())
    );

    // +0900 offset is normalized to UTC
    assert_eq!(
        items[1].published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 13, 8, 0, 0).unwrap())
    );

    // guid stands in for a missing link; unparsable date stays unknown
    assert_eq!(items[2].url, "https://blog.practical.test/posts/reading-list");
    assert!(items[2].published_at.is_none());
}

#[test]
fn atom_entries_prefer_alternate_link_and_content() {
    let now = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
    let items = parse_feed(
        &fixture("company_atom.xml"),
        &company(),
        now,
        FeedLimits::default(),
    )
    .unwrap();
    assert_eq!(items.len(), 2);

    let a = &items[0];
    assert_eq!(a.url, "https://eng.company.test/posts/llm-serving");
    assert!(a.body.contains("사례"));
    assert!(!a.body.contains("<p>"));
    assert_eq!(
        a.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 14, 0, 0, 0).unwrap())
    );

    let b = &items[1];
    assert_eq!(b.url, "https://eng.company.test/posts/vector-index-v2");
    assert_eq!(b.body, "We announce the second generation of our vector index.");
    // only <updated> present
    assert_eq!(
        b.published_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap())
    );
}

#[test]
fn max_items_caps_feed_order() {
    let now = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
    let limits = FeedLimits {
        max_items: 1,
        max_age_days: None,
    };
    let items = parse_feed(&fixture("practical_rss.xml"), &practical(), now, limits).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "How to serve an LLM on a single GPU");
}

#[tokio::test]
async fn collect_all_keeps_partial_results_and_counts_errors() {
    let no_age = FeedLimits {
        max_items: 20,
        max_age_days: None,
    };
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(
            RssCollector::from_fixture_str(practical(), &fixture("practical_rss.xml"))
                .with_limits(no_age),
        ),
        Box::new(RssCollector::from_fixture_str(company(), "<html>not a feed</html>")),
        Box::new(
            RssCollector::from_fixture_str(company(), &fixture("company_atom.xml"))
                .with_limits(no_age),
        ),
        Box::new(StaticCollector::new("empty", vec![]).with_error("timeout")),
    ];

    let batch = collect_all(&collectors).await;
    // 4 RSS entries with a title (age limit off) + 2 Atom entries
    assert_eq!(batch.articles.len(), 6);
    assert_eq!(batch.errors, 2);
    assert_eq!(batch.articles[0].source_id, "practical_notes");
    assert_eq!(batch.articles[5].source_id, "company_eng");
}
