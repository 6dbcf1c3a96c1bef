// src/collect/mod.rs
pub mod rss;
pub mod sources;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{info, warn};

use crate::article::Article;
use crate::metrics::{COLLECTED_TOTAL, COLLECTOR_ERRORS_TOTAL};

pub use rss::RssCollector;
pub use sources::{default_catalog, SourceSpec};

/// Body text cap applied by collectors.
pub const MAX_BODY_CHARS: usize = 2000;

/// What a collector produced for one run: possibly partial, possibly with an error.
#[derive(Debug, Default)]
pub struct Collected {
    pub articles: Vec<Article>,
    pub error: Option<anyhow::Error>,
}

impl Collected {
    pub fn ok(articles: Vec<Article>) -> Self {
        Self {
            articles,
            error: None,
        }
    }

    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            articles: Vec::new(),
            error: Some(error),
        }
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> Collected;
    fn name(&self) -> &str;
}

/// Result of running every collector once.
#[derive(Debug, Default)]
pub struct CollectionBatch {
    /// All articles, in collector order.
    pub articles: Vec<Article>,
    /// Collectors that reported an error (with or without partial results).
    pub errors: usize,
}

/// Run every collector in order and concatenate the results. Never fails:
/// collector errors are logged and counted.
pub async fn collect_all(collectors: &[Box<dyn Collector>]) -> CollectionBatch {
    crate::metrics::ensure_described();
    let mut batch = CollectionBatch::default();
    for c in collectors {
        let Collected { mut articles, error } = c.collect().await;
        if let Some(e) = error {
            warn!(target: "collect", collector = c.name(), partial = articles.len(), error = %format!("{e:#}"), "collector error");
            counter!(COLLECTOR_ERRORS_TOTAL).increment(1);
            batch.errors += 1;
        }
        info!(target: "collect", collector = c.name(), count = articles.len(), "collected");
        batch.articles.append(&mut articles);
    }
    counter!(COLLECTED_TOTAL).increment(batch.articles.len() as u64);
    batch
}

/// Clean feed text: decode HTML entities, strip tags, normalize quotes,
/// collapse whitespace, cap at `max_chars`.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode (twice covers double-escaped feeds)
    let decoded = html_escape::decode_html_entities(s);
    let mut out = html_escape::decode_html_entities(&decoded).to_string();

    // 2) Strip HTML tags and script/style blocks
    static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
    let re_blocks = RE_BLOCKS
        .get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
    out = re_blocks.replace_all(&out, " ").to_string();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize typographic quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }
    out
}

/// Fixed list of articles, optionally with an error. For tests and embedding.
#[derive(Debug)]
pub struct StaticCollector {
    name: String,
    articles: Vec<Article>,
    error: Option<String>,
}

impl StaticCollector {
    pub fn new(name: impl Into<String>, articles: Vec<Article>) -> Self {
        Self {
            name: name.into(),
            articles,
            error: None,
        }
    }

    /// Report `error` alongside the articles (a partial result).
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[async_trait]
impl Collector for StaticCollector {
    async fn collect(&self) -> Collected {
        Collected {
            articles: self.articles.clone(),
            error: self.error.as_ref().map(|e| anyhow::anyhow!("{e}")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
