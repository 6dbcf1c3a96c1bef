// src/dedup/mod.rs
//! Deduplication engine.
//!
//! An article's identity is the SHA-256 of its normalized URL. Normalization
//! drops the scheme, fragment, default port, a leading `www.`, trailing
//! slashes and tracking query parameters, lower-cases the host and sorts the
//! remaining query pairs, so `http://x.com/a` and `https://x.com/a/?utm_source=rss`
//! collapse to the same identity.
//!
//! The engine only touches the in-memory [`IdentitySet`]; loading and saving
//! it is the [`history::HistoryStore`]'s job.

pub mod history;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing::debug;
use url::Url;

use crate::article::Article;
use crate::error::ConfigError;

pub use history::{
    DedupRecord, HistoryStore, IdentitySet, JsonFileHistoryStore, MemoryHistoryStore,
};

fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "fbclid", "gclid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src", "source",
        "cmpid", "_hsenc", "_hsmi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Days an identity stays in history before it may be evicted.
    pub retention_days: u32,
    /// Query parameters dropped during normalization. A trailing `*` matches by prefix.
    pub tracking_params: Vec<String>,
    /// Best-effort near-duplicate title check (normalized Levenshtein, 0..=1).
    /// `None` disables it.
    pub title_similarity: Option<f64>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            tracking_params: default_tracking_params(),
            title_similarity: None,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::invalid("dedup.retention_days", "must be >= 1"));
        }
        if let Some(t) = self.title_similarity {
            if !(t > 0.0 && t <= 1.0) {
                return Err(ConfigError::invalid(
                    "dedup.title_similarity",
                    format!("{t} is outside (0, 1]"),
                ));
            }
        }
        Ok(())
    }
}

/// Fixed-width canonical identifier (hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn of(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.as_bytes());
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            let _ = write!(&mut out, "{:02x}", b);
        }
        Identity(out)
    }

    /// Short prefix for logs.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_tracking_param(name: &str, tracking: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    tracking.iter().any(|p| match p.strip_suffix('*') {
        Some(prefix) => name.starts_with(&prefix.to_ascii_lowercase()),
        None => name == p.to_ascii_lowercase(),
    })
}

/// Canonical form of `raw`, or `None` when it has no usable host.
pub fn normalize_url(raw: &str, tracking: &[String]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("http://{trimmed}")))
        .ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    let mut out = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if let Some(port) = parsed.port() {
        let _ = write!(&mut out, ":{port}");
    }
    out.push_str(parsed.path().trim_end_matches('/'));

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, tracking))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    for (i, (k, v)) in pairs.iter().enumerate() {
        out.push(if i == 0 { '?' } else { '&' });
        out.push_str(k);
        if !v.is_empty() {
            out.push('=');
            out.push_str(v);
        }
    }
    Some(out)
}

/// Identity for a raw URL, `None` when it cannot be normalized.
pub fn identity_for_url(raw: &str, tracking: &[String]) -> Option<Identity> {
    normalize_url(raw, tracking).map(|c| Identity::of(&c))
}

/// Lower-case, keep letters/digits/spaces, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_space = true;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if ch.is_whitespace() && !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Result of [`Deduplicator::filter_new`].
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Accepted articles, in input order.
    pub accepted: Vec<Article>,
    /// Articles dropped as duplicates (URL identity or similar title).
    pub rejected: usize,
    /// Subset of `rejected` caught by the title similarity check.
    pub similar_title: usize,
    /// Accepted articles without a usable URL (never added to history).
    pub unkeyed: usize,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    cfg: DedupConfig,
}

impl Deduplicator {
    pub fn new(cfg: DedupConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.cfg
    }

    pub fn identity(&self, article: &Article) -> Option<Identity> {
        identity_for_url(&article.url, &self.cfg.tracking_params)
    }

    /// Admit articles whose identity is not yet in `history`.
    ///
    /// Accepted identities are inserted immediately, so a second occurrence
    /// within the same batch is rejected. Articles without a usable URL are
    /// always accepted and never recorded.
    pub fn filter_new(
        &self,
        articles: Vec<Article>,
        history: &mut IdentitySet,
        now: DateTime<Utc>,
    ) -> DedupOutcome {
        let mut out = DedupOutcome {
            accepted: Vec::with_capacity(articles.len()),
            ..Default::default()
        };

        let threshold = self.cfg.title_similarity;
        let mut seen_titles: Vec<String> = match threshold {
            Some(_) => history.titles().map(str::to_string).collect(),
            None => Vec::new(),
        };

        for article in articles {
            let Some(id) = self.identity(&article) else {
                debug!(target: "dedup", source = %article.source_id, "no usable url, accepting without identity");
                out.unkeyed += 1;
                out.accepted.push(article);
                continue;
            };

            if history.contains(&id) {
                debug!(target: "dedup", id = id.short(), source = %article.source_id, "duplicate url");
                out.rejected += 1;
                continue;
            }

            let title = normalize_title(&article.title);
            if let Some(t) = threshold {
                if !title.is_empty()
                    && seen_titles
                        .iter()
                        .any(|s| strsim::normalized_levenshtein(s, &title) >= t)
                {
                    debug!(target: "dedup", id = id.short(), source = %article.source_id, "similar title");
                    out.rejected += 1;
                    out.similar_title += 1;
                    continue;
                }
            }

            let record_title = match threshold {
                Some(_) if !title.is_empty() => {
                    seen_titles.push(title.clone());
                    Some(title)
                }
                _ => None,
            };
            history.insert(id, DedupRecord::new(now, record_title));
            out.accepted.push(article);
        }

        out
    }
}

/// Evict records first seen more than `retention_days` before `now`.
/// Returns the number of evicted records.
pub fn prune(history: &mut IdentitySet, now: DateTime<Utc>, retention_days: u32) -> usize {
    let cutoff = now - Duration::days(i64::from(retention_days));
    history.retain_since(cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SourceTag;

    fn tracking() -> Vec<String> {
        DedupConfig::default().tracking_params
    }

    fn art(url: &str, title: &str) -> Article {
        Article::new("src", url, title, "body", SourceTag::NewsMedia)
    }

    #[test]
    fn normalization_ignores_surface_noise() {
        let t = tracking();
        let a = normalize_url("http://X.com/a", &t).unwrap();
        let b = normalize_url("https://x.com/a/", &t).unwrap();
        let c =
            normalize_url("https://www.x.com/a?utm_source=rss&utm_medium=feed#top", &t).unwrap();
        assert_eq!(a, "x.com/a");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn meaningful_query_is_kept_and_sorted() {
        let t = tracking();
        let a = normalize_url("https://x.com/p?b=2&a=1&fbclid=zz", &t).unwrap();
        let b = normalize_url("https://x.com/p?a=1&b=2", &t).unwrap();
        assert_eq!(a, "x.com/p?a=1&b=2");
        assert_eq!(a, b);
        assert_ne!(a, normalize_url("https://x.com/p?a=2&b=2", &t).unwrap());
    }

    #[test]
    fn path_case_matters_host_case_does_not() {
        let t = tracking();
        assert_eq!(
            normalize_url("https://EXAMPLE.org/Post", &t),
            normalize_url("https://example.org/Post", &t)
        );
        assert_ne!(
            normalize_url("https://example.org/Post", &t),
            normalize_url("https://example.org/post", &t)
        );
    }

    #[test]
    fn bare_host_and_empty_inputs() {
        let t = tracking();
        assert_eq!(normalize_url("x.com/a/", &t).as_deref(), Some("x.com/a"));
        assert!(normalize_url("", &t).is_none());
        assert!(normalize_url("   ", &t).is_none());
    }

    #[test]
    fn identity_is_fixed_width_hex() {
        let id = identity_for_url("https://x.com/a", &tracking()).unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.short().len(), 12);
    }

    #[test]
    fn within_batch_duplicate_rejected_on_second_occurrence() {
        let d = Deduplicator::new(DedupConfig::default());
        let mut h = IdentitySet::default();
        let out = d.filter_new(
            vec![art("http://x.com/a", "First"), art("http://x.com/a/", "Second")],
            &mut h,
            Utc::now(),
        );
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].title, "First");
        assert_eq!(out.rejected, 1);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn empty_url_always_accepted_never_recorded() {
        let d = Deduplicator::new(DedupConfig::default());
        let mut h = IdentitySet::default();
        let out = d.filter_new(vec![art("", "A"), art("", "A")], &mut h, Utc::now());
        assert_eq!(out.accepted.len(), 2);
        assert_eq!(out.unkeyed, 2);
        assert!(h.is_empty());
    }

    #[test]
    fn similar_titles_rejected_when_enabled() {
        let d = Deduplicator::new(DedupConfig {
            title_similarity: Some(0.8),
            ..Default::default()
        });
        let mut h = IdentitySet::default();
        let out = d.filter_new(
            vec![
                art("https://a.com/1", "OpenAI announces GPT-5 today"),
                art("https://b.com/2", "OpenAI announces GPT-5 today!"),
                art("https://c.com/3", "Completely different headline"),
            ],
            &mut h,
            Utc::now(),
        );
        assert_eq!(out.accepted.len(), 2);
        assert_eq!(out.similar_title, 1);
        assert!(h.titles().any(|t| t == "openai announces gpt5 today"));
    }

    #[test]
    fn prune_evicts_only_old_records() {
        let now = Utc::now();
        let mut h = IdentitySet::default();
        h.insert(
            identity_for_url("https://x.com/old", &tracking()).unwrap(),
            DedupRecord::new(now - Duration::days(31), None),
        );
        h.insert(
            identity_for_url("https://x.com/new", &tracking()).unwrap(),
            DedupRecord::new(now - Duration::days(29), None),
        );
        assert_eq!(prune(&mut h, now, 30), 1);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn config_validation() {
        assert!(DedupConfig::default().validate().is_ok());
        let bad = DedupConfig {
            retention_days: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad_sim = DedupConfig {
            title_similarity: Some(1.5),
            ..Default::default()
        };
        assert!(bad_sim.validate().is_err());
    }
}
