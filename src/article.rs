// src/article.rs
//! Article record flowing through the curation pipeline.
//!
//! Collectors fill the source fields; everything under "derived" is written
//! only by the pipeline orchestrator as the article moves through scoring,
//! translation and summarization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source category. Each tier has its own base score and target share of the
/// final selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    NewsMedia,
    PracticalBlog,
    CompanyBlog,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [
        SourceTag::NewsMedia,
        SourceTag::PracticalBlog,
        SourceTag::CompanyBlog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::NewsMedia => "news-media",
            SourceTag::PracticalBlog => "practical-blog",
            SourceTag::CompanyBlog => "company-blog",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per tier. Used for base scores and selection proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TierMap<T> {
    pub news_media: T,
    pub practical_blog: T,
    pub company_blog: T,
}

impl<T> TierMap<T> {
    pub fn get(&self, tag: SourceTag) -> &T {
        match tag {
            SourceTag::NewsMedia => &self.news_media,
            SourceTag::PracticalBlog => &self.practical_blog,
            SourceTag::CompanyBlog => &self.company_blog,
        }
    }

    pub fn get_mut(&mut self, tag: SourceTag) -> &mut T {
        match tag {
            SourceTag::NewsMedia => &mut self.news_media,
            SourceTag::PracticalBlog => &mut self.practical_blog,
            SourceTag::CompanyBlog => &mut self.company_blog,
        }
    }
}

impl<T: Default> Default for TierMap<T> {
    fn default() -> Self {
        Self {
            news_media: T::default(),
            practical_blog: T::default(),
            company_blog: T::default(),
        }
    }
}

/// Why an enrichment step used the local fallback instead of a provider result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackReason {
    /// Provider returned an error or a malformed response.
    ProviderError,
    /// Per-call timeout elapsed.
    Timeout,
    /// Provider was disabled for the rest of the run by the kill switch.
    KillSwitch,
    /// Run-level deadline expired before the call was made.
    Deadline,
    /// No provider configured.
    Unavailable,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FallbackReason::ProviderError => "provider-error",
            FallbackReason::Timeout => "timeout",
            FallbackReason::KillSwitch => "kill-switch",
            FallbackReason::Deadline => "deadline",
            FallbackReason::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Outcome of an enrichment step for a single article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "reason")]
pub enum Enrichment {
    /// Stage has not run for this article yet.
    #[default]
    Pending,
    /// Nothing to do (already in target language, body too short to summarize...).
    NotNeeded,
    /// Provider result applied.
    Completed,
    /// Local fallback applied.
    Fallback(FallbackReason),
}

impl Enrichment {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Enrichment::Fallback(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Stable source identifier, e.g. `techcrunch_ai`.
    pub source_id: String,
    /// Canonical URL as reported by the source. May be empty.
    #[serde(default)]
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub tag: SourceTag,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Language hint from the source (`en`, `ko`...).
    #[serde(default)]
    pub language: Option<String>,

    // --- derived ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_tags: Vec<String>,
    #[serde(default)]
    pub translation: Enrichment,
    #[serde(default)]
    pub summarization: Enrichment,
}

impl Article {
    pub fn new(
        source_id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        tag: SourceTag,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            title: title.into(),
            body: body.into(),
            tag,
            published_at: None,
            keywords: Vec::new(),
            language: None,
            title_translated: None,
            body_translated: None,
            summary: None,
            score: None,
            derived_tags: Vec::new(),
            translation: Enrichment::Pending,
            summarization: Enrichment::Pending,
        }
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.language = Some(lang.into());
        self
    }

    pub fn keywords<I, S>(mut self, kws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = kws.into_iter().map(Into::into).collect();
        self
    }

    /// Title to show or summarize: translated when available.
    pub fn display_title(&self) -> &str {
        self.title_translated.as_deref().unwrap_or(&self.title)
    }

    /// Body to summarize: translated when available.
    pub fn display_body(&self) -> &str {
        self.body_translated.as_deref().unwrap_or(&self.body)
    }
}
