// src/collect/rss.rs
//! RSS 2.0 / Atom collector.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::debug;

use super::sources::SourceSpec;
use super::{clean_text, Collected, Collector, MAX_BODY_CHARS};
use crate::article::Article;

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}
#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Limits applied while turning feed entries into articles.
#[derive(Debug, Clone, Copy)]
pub struct FeedLimits {
    /// Entries kept per feed, in feed order.
    pub max_items: usize,
    /// Entries older than this are dropped; undated entries are kept.
    pub max_age_days: Option<u32>,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            max_items: 20,
            max_age_days: Some(60),
        }
    }
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    match OffsetDateTime::parse(ts.trim(), &Rfc2822) {
        Ok(dt) => DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()),
        // chrono is laxer about obsolete zone names
        Err(_) => DateTime::parse_from_rfc2822(ts.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc)),
    }
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Parse a feed timestamp. Unparsable input yields `None`.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    parse_rfc2822(ts).or_else(|| parse_rfc3339(ts))
}

/// Replace HTML-only entities that are not valid XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

struct RawEntry {
    title: String,
    url: String,
    body: String,
    published: Option<DateTime<Utc>>,
    keywords: Vec<String>,
}

fn rss_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| RawEntry {
            title: it.title.unwrap_or_default(),
            url: it.link.or(it.guid).unwrap_or_default(),
            body: it.description.unwrap_or_default(),
            published: it.pub_date.as_deref().and_then(parse_feed_date),
            keywords: it.categories,
        })
        .collect())
}

fn atom_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let feed: Feed = from_str(xml).context("parsing atom xml")?;
    Ok(feed
        .entry
        .into_iter()
        .map(|e| {
            let url = e
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
                .or_else(|| e.links.first())
                .map(|l| l.href.clone())
                .or(e.id)
                .unwrap_or_default();
            // xhtml content keeps its text in child elements; use the summary then
            let body = e
                .content
                .map(|t| t.value)
                .filter(|v| !clean_text(v, MAX_BODY_CHARS).is_empty())
                .or(e.summary.map(|t| t.value))
                .unwrap_or_default();
            RawEntry {
                title: e.title.map(|t| t.value).unwrap_or_default(),
                url,
                body,
                published: e
                    .published
                    .as_deref()
                    .or(e.updated.as_deref())
                    .and_then(parse_feed_date),
                keywords: Vec::new(),
            }
        })
        .collect())
}

/// Parse an RSS or Atom document into articles for `spec`.
pub fn parse_feed(
    xml: &str,
    spec: &SourceSpec,
    now: DateTime<Utc>,
    limits: FeedLimits,
) -> Result<Vec<Article>> {
    let xml = scrub_html_entities_for_xml(xml);
    let entries = if xml.contains("<rss") {
        rss_entries(&xml)?
    } else if xml.contains("<feed") {
        atom_entries(&xml)?
    } else {
        bail!("{}: neither RSS nor Atom", spec.id);
    };

    let cutoff = limits
        .max_age_days
        .map(|d| now - Duration::days(i64::from(d)));
    let mut out = Vec::with_capacity(entries.len().min(limits.max_items));
    for e in entries {
        if out.len() >= limits.max_items {
            break;
        }
        let title = clean_text(&e.title, MAX_BODY_CHARS);
        if title.is_empty() {
            continue;
        }
        let body = clean_text(&e.body, MAX_BODY_CHARS);
        if !spec.admits(&title, &body, &e.keywords) {
            debug!(target: "collect", source = %spec.id, title = %title, "no required keyword");
            continue;
        }
        if let (Some(cut), Some(p)) = (cutoff, e.published) {
            if p < cut {
                debug!(target: "collect", source = %spec.id, "entry older than max age");
                continue;
            }
        }
        let mut a = Article::new(
            spec.id.clone(),
            e.url.trim(),
            title,
            body,
            spec.tag,
        )
        .keywords(
            e.keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty()),
        );
        a.published_at = e.published;
        a.language = spec.language.clone();
        out.push(a);
    }
    Ok(out)
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

pub struct RssCollector {
    spec: SourceSpec,
    limits: FeedLimits,
    mode: Mode,
}

impl RssCollector {
    /// Parse `xml` instead of fetching (tests, offline runs).
    pub fn from_fixture_str(spec: SourceSpec, xml: &str) -> Self {
        Self {
            spec,
            limits: FeedLimits::default(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    /// Fetch `spec.feed_url` over HTTP.
    pub fn from_spec(spec: SourceSpec) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ds-news-curator/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            spec,
            limits: FeedLimits::default(),
            mode: Mode::Http(client),
        })
    }

    pub fn with_limits(mut self, limits: FeedLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http(client) => {
                let resp = client
                    .get(&self.spec.feed_url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.spec.id))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("{}: HTTP {status}", self.spec.id);
                }
                resp.text()
                    .await
                    .with_context(|| format!("{} http .text()", self.spec.id))?
            }
        };
        parse_feed(&body, &self.spec, Utc::now(), self.limits)
    }
}

#[async_trait]
impl Collector for RssCollector {
    async fn collect(&self) -> Collected {
        match self.fetch().await {
            Ok(articles) => Collected::ok(articles),
            Err(e) => Collected::failed(e),
        }
    }

    fn name(&self) -> &str {
        &self.spec.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_dates_rfc2822_and_rfc3339() {
        let a = parse_feed_date("Tue, 14 May 2024 08:30:00 GMT").unwrap();
        let b = parse_feed_date("2024-05-14T08:30:00Z").unwrap();
        assert_eq!(a, b);
        let c = parse_feed_date("Tue, 14 May 2024 10:30:00 +0200").unwrap();
        assert_eq!(a, c);
        assert!(parse_feed_date("last tuesday").is_none());
    }

    #[test]
    fn xhtml_content_falls_back_to_summary() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>A post</title>
    <link href="https://blog.test/a-post"/>
    <updated>2024-05-14T08:30:00Z</updated>
    <summary>Notes on shipping a feature store.</summary>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hello xhtml</p></div></content>
  </entry>
</feed>"#;
        let spec = crate::collect::default_catalog().remove(0);
        let now = parse_feed_date("2024-05-15T00:00:00Z").unwrap();
        let out = parse_feed(xml, &spec, now, FeedLimits::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "A post");
        assert_eq!(out[0].body, "Notes on shipping a feature store.");
    }

    #[test]
    fn required_keywords_gate_entries() {
        let xml = r#"<rss version="2.0"><channel>
  <item><title>사내 워크숍 후기</title><link>https://blog.test/1</link><description>팀 빌딩 행사를 다녀왔습니다.</description></item>
  <item><title>추천 시스템 개선기</title><link>https://blog.test/2</link><description>머신러닝 모델로 CTR을 올린 과정.</description></item>
  <item><title>Release notes</title><link>https://blog.test/3</link><category>AI</category></item>
</channel></rss>"#;
        let mut spec = crate::collect::default_catalog().remove(0);
        spec.require_keywords = vec!["머신러닝".into(), "ai".into()];
        let out = parse_feed(xml, &spec, Utc::now(), FeedLimits::default()).unwrap();
        let urls: Vec<&str> = out.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, ["https://blog.test/2", "https://blog.test/3"]);
    }

    #[test]
    fn unknown_document_is_an_error() {
        let spec = crate::collect::default_catalog().remove(0);
        assert!(parse_feed("<html></html>", &spec, Utc::now(), FeedLimits::default()).is_err());
    }
}
