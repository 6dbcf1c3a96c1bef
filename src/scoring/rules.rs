// src/scoring/rules.rs
//! Declarative scoring rules.
//!
//! TOML shape:
//! ```toml
//! [scoring.base]
//! news-media = 100.0
//! practical-blog = 80.0
//! company-blog = 70.0
//!
//! [scoring.freshness]
//! day_bonus = 10.0
//! week_bonus = 5.0
//!
//! [scoring.length]
//! min_chars = 500
//! penalty = 15.0
//!
//! [[scoring.rules]]
//! pattern = "how to"
//! weight = 20.0
//! tag = "guide"
//! ```
//!
//! Patterns match case-insensitively as substrings of title or body. Negative
//! weights act as exclusion patterns. Rules are compiled once at load time:
//! a pattern declared twice with different weights is rejected there.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use tracing::warn;

use crate::article::TierMap;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRuleConfig {
    pub pattern: String,
    pub weight: f64,
    /// Derived tag attached to matching articles.
    #[serde(default)]
    pub tag: Option<String>,
}

impl KeywordRuleConfig {
    pub fn new(pattern: &str, weight: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Added when the article is younger than 24h.
    pub day_bonus: f64,
    /// Added when the article is younger than 7 days (and not younger than 24h).
    pub week_bonus: f64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            day_bonus: 10.0,
            week_bonus: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthConfig {
    pub min_chars: usize,
    pub penalty: f64,
}

impl Default for LengthConfig {
    fn default() -> Self {
        Self {
            min_chars: 500,
            penalty: 15.0,
        }
    }
}

/// `[scoring]` section as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base: TierMap<f64>,
    /// Per-source base overriding the tier base (source id -> base).
    pub source_base: BTreeMap<String, f64>,
    pub freshness: FreshnessConfig,
    pub length: LengthConfig,
    pub rules: Vec<KeywordRuleConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: TierMap {
                news_media: 100.0,
                practical_blog: 80.0,
                company_blog: 70.0,
            },
            source_base: BTreeMap::new(),
            freshness: FreshnessConfig::default(),
            length: LengthConfig::default(),
            rules: default_rules(),
        }
    }
}

/// Seed rules: announcements, guides, case studies, LLM and time-series topics,
/// opinion pieces and low-effort questions.
pub fn default_rules() -> Vec<KeywordRuleConfig> {
    let mut v = Vec::new();
    for p in ["announces", "launches", "releases", "unveils", "발표", "출시"] {
        v.push(KeywordRuleConfig::new(p, 30.0).tagged("announcement"));
    }
    for p in ["how to", "guide", "tutorial", "step-by-step", "가이드", "튜토리얼"] {
        v.push(KeywordRuleConfig::new(p, 20.0).tagged("guide"));
    }
    for p in ["case study", "lessons learned", "how we", "사례"] {
        v.push(KeywordRuleConfig::new(p, 15.0).tagged("case-study"));
    }
    for p in ["llm", "language model", "transformer"] {
        v.push(KeywordRuleConfig::new(p, 10.0).tagged("llm"));
    }
    for p in ["time series", "forecasting", "시계열"] {
        v.push(KeywordRuleConfig::new(p, 10.0).tagged("time-series"));
    }
    for p in ["opinion", "my take", "i think"] {
        v.push(KeywordRuleConfig::new(p, -20.0));
    }
    for p in ["what do you think", "recommendations?", "help me", "추천해주세요"] {
        v.push(KeywordRuleConfig::new(p, -30.0));
    }
    v
}

/// A validated keyword rule with its normalized pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    /// Pattern as declared.
    pub pattern: String,
    pub weight: f64,
    pub tag: Option<String>,
    needle: String,
}

impl KeywordRule {
    /// Case-insensitive substring match on already-normalized haystack.
    pub(crate) fn matches(&self, normalized: &str) -> bool {
        normalized.contains(self.needle.as_str())
    }
}

/// Compiled, immutable scoring configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    pub base: TierMap<f64>,
    pub source_base: BTreeMap<String, f64>,
    pub freshness: FreshnessConfig,
    pub length: LengthConfig,
    rules: Vec<KeywordRule>,
}

impl ScoringRules {
    /// Validate and compile. Declaration order is preserved.
    pub fn compile(cfg: &ScoringConfig) -> Result<Self, ConfigError> {
        for tag in crate::article::SourceTag::ALL {
            if !cfg.base.get(tag).is_finite() {
                return Err(ConfigError::invalid(
                    "scoring.base",
                    format!("{tag} base is not finite"),
                ));
            }
        }
        if let Some((id, _)) = cfg.source_base.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::invalid(
                "scoring.source_base",
                format!("{id} base is not finite"),
            ));
        }
        let f = &cfg.freshness;
        if !f.day_bonus.is_finite() || !f.week_bonus.is_finite() {
            return Err(ConfigError::invalid("scoring.freshness", "bonus is not finite"));
        }
        if !cfg.length.penalty.is_finite() {
            return Err(ConfigError::invalid("scoring.length.penalty", "not finite"));
        }

        let mut seen: HashMap<String, f64> = HashMap::new();
        let mut rules = Vec::with_capacity(cfg.rules.len());
        for (index, r) in cfg.rules.iter().enumerate() {
            let needle = normalize(&r.pattern);
            if needle.is_empty() {
                return Err(ConfigError::EmptyPattern { index });
            }
            if !r.weight.is_finite() {
                return Err(ConfigError::NonFiniteWeight {
                    pattern: r.pattern.clone(),
                });
            }
            if let Some(&first) = seen.get(&needle) {
                if first != r.weight {
                    return Err(ConfigError::ConflictingRule {
                        pattern: r.pattern.clone(),
                        first,
                        second: r.weight,
                    });
                }
                warn!(target: "config", pattern = %r.pattern, "duplicate keyword rule ignored");
                continue;
            }
            seen.insert(needle.clone(), r.weight);
            rules.push(KeywordRule {
                pattern: r.pattern.clone(),
                weight: r.weight,
                tag: r.tag.clone(),
                needle,
            });
        }

        Ok(Self {
            base: cfg.base,
            source_base: cfg.source_base.clone(),
            freshness: cfg.freshness,
            length: cfg.length,
            rules,
        })
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

/// Lower-case and collapse whitespace runs to one space.
pub(crate) fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out.trim().to_string()
}
