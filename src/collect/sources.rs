// src/collect/sources.rs
use serde::{Deserialize, Serialize};
use url::Url;

use crate::article::SourceTag;
use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

/// Topic gate for general-purpose engineering blogs in the built-in catalog.
pub const DS_ML_KEYWORDS: &[&str] = &[
    "인공지능",
    "데이터",
    "분석",
    "예측",
    "모델링",
    "딥러닝",
    "머신러닝",
    "기계학습",
    "신경망",
    "알고리즘",
    "machine learning",
    "deep learning",
    "llm",
    "data",
];

/// One feed to collect from (`[[sources]]` entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Stable id, e.g. `techcrunch_ai`. Copied into every article.
    pub id: String,
    pub name: String,
    pub feed_url: String,
    pub tag: SourceTag,
    /// Language of the feed's articles, if known.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When non-empty, only entries mentioning one of these (case-insensitive,
    /// in title, body or categories) are collected.
    #[serde(default)]
    pub require_keywords: Vec<String>,
}

impl SourceSpec {
    pub fn new(id: &str, name: &str, feed_url: &str, tag: SourceTag, language: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            tag,
            language: Some(language.to_string()),
            enabled: true,
            require_keywords: Vec::new(),
        }
    }

    pub fn require_keywords(mut self, keywords: &[&str]) -> Self {
        self.require_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Whether an entry passes the keyword gate.
    pub fn admits(&self, title: &str, body: &str, categories: &[String]) -> bool {
        if self.require_keywords.is_empty() {
            return true;
        }
        let haystack = format!("{title} {body} {}", categories.join(" ")).to_lowercase();
        self.require_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && haystack.contains(&k))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("sources.id", "must not be empty"));
        }
        if self.require_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "sources.require_keywords",
                format!("{}: empty keyword", self.id),
            ));
        }
        match Url::parse(&self.feed_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::invalid(
                "sources.feed_url",
                format!("{}: {:?} is not an http(s) URL", self.id, self.feed_url),
            )),
        }
    }
}

/// Built-in catalog used when the config lists no sources.
pub fn default_catalog() -> Vec<SourceSpec> {
    use SourceTag::*;
    vec![
        SourceSpec::new(
            "techcrunch_ai",
            "TechCrunch AI",
            "https://techcrunch.com/category/artificial-intelligence/feed/",
            NewsMedia,
            "en",
        ),
        SourceSpec::new(
            "mit_tech_review",
            "MIT Technology Review",
            "https://www.technologyreview.com/feed/",
            NewsMedia,
            "en",
        ),
        SourceSpec::new(
            "wired_ai",
            "WIRED AI",
            "https://www.wired.com/feed/tag/ai/latest/rss",
            NewsMedia,
            "en",
        ),
        SourceSpec::new(
            "tech42",
            "Tech42",
            "https://www.tech42.co.kr/feed/",
            NewsMedia,
            "ko",
        ),
        SourceSpec::new(
            "towards_data_science",
            "Towards Data Science",
            "https://towardsdatascience.com/feed",
            PracticalBlog,
            "en",
        ),
        SourceSpec::new(
            "analytics_vidhya",
            "Analytics Vidhya",
            "https://www.analyticsvidhya.com/feed/",
            PracticalBlog,
            "en",
        ),
        SourceSpec::new(
            "kdnuggets",
            "KDnuggets",
            "https://www.kdnuggets.com/feed",
            PracticalBlog,
            "en",
        ),
        SourceSpec::new(
            "neptune_ai",
            "Neptune.ai Blog",
            "https://neptune.ai/blog/feed",
            PracticalBlog,
            "en",
        ),
        SourceSpec::new(
            "google_ai",
            "Google AI Blog",
            "https://blog.research.google/feeds/posts/default",
            CompanyBlog,
            "en",
        ),
        SourceSpec::new(
            "openai",
            "OpenAI Blog",
            "https://openai.com/blog/rss.xml",
            CompanyBlog,
            "en",
        ),
        SourceSpec::new(
            "naver_d2",
            "NAVER D2",
            "https://d2.naver.com/d2.atom",
            CompanyBlog,
            "ko",
        )
        .require_keywords(DS_ML_KEYWORDS),
        SourceSpec::new(
            "kakao_tech",
            "Kakao Tech",
            "https://tech.kakao.com/feed/",
            CompanyBlog,
            "ko",
        )
        .require_keywords(DS_ML_KEYWORDS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_valid_and_covers_every_tier() {
        let cat = default_catalog();
        assert_eq!(cat.len(), 12);
        for s in &cat {
            s.validate().unwrap();
        }
        for tag in SourceTag::ALL {
            assert!(cat.iter().any(|s| s.tag == tag), "no source for {tag}");
        }
    }

    #[test]
    fn keyword_gate_is_case_insensitive() {
        let cat = default_catalog();
        let d2 = cat.iter().find(|s| s.id == "naver_d2").unwrap();
        assert!(d2.admits("LLM 서빙 인프라", "", &[]));
        assert!(d2.admits("신규 입사자 온보딩", "", &["Machine Learning".into()]));
        assert!(!d2.admits("사내 행사 후기", "즐거웠습니다.", &[]));
        // sources without a gate take everything
        assert!(cat[0].admits("anything", "", &[]));
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut s = default_catalog().remove(0);
        s.feed_url = "ftp://x.test/feed".into();
        assert!(s.validate().is_err());
        s.feed_url = "not a url".into();
        assert!(s.validate().is_err());
    }
}
