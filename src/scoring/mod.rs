// src/scoring/mod.rs
//! Scoring & selection engine.
//!
//! `score = base(tier or source) + Σ keyword weights + freshness − length penalty`
//!
//! Scoring is a pure function of `(article, now, rules)`; logging is layered
//! on top via [`log_breakdown`]. Selection lives in [`select`].

pub mod rules;
pub mod select;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::article::Article;
pub use rules::{ScoringConfig, ScoringRules};
pub use select::{select, SelectionConfig, SelectionResult};

/// One matched keyword rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub pattern: String,
    pub weight: f64,
}

/// Per-article score with every contribution spelled out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    /// Matched rules, in declaration order.
    pub hits: Vec<RuleHit>,
    pub keyword_total: f64,
    pub freshness_bonus: f64,
    pub length_penalty: f64,
    /// Tags of matched rules, deduplicated, in declaration order.
    pub tags: Vec<String>,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base + self.keyword_total + self.freshness_bonus - self.length_penalty
    }
}

/// Freshness bonus for an article published at `published` as seen at `now`.
/// Missing or future timestamps get nothing.
pub fn freshness_bonus(
    published: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    rules: &ScoringRules,
) -> f64 {
    let Some(published) = published else {
        return 0.0;
    };
    let age = now - published;
    if age < Duration::zero() {
        0.0
    } else if age < Duration::hours(24) {
        rules.freshness.day_bonus
    } else if age < Duration::days(7) {
        rules.freshness.week_bonus
    } else {
        0.0
    }
}

/// Compute the score breakdown. Pure: same inputs, same output.
pub fn score_article(
    article: &Article,
    now: DateTime<Utc>,
    rules: &ScoringRules,
) -> ScoreBreakdown {
    let base = rules
        .source_base
        .get(&article.source_id)
        .copied()
        .unwrap_or(*rules.base.get(article.tag));

    let title = rules::normalize(&article.title);
    let body = rules::normalize(&article.body);

    let mut hits = Vec::new();
    let mut keyword_total = 0.0;
    let mut tags: Vec<String> = Vec::new();
    for rule in rules.rules() {
        if rule.matches(&title) || rule.matches(&body) {
            keyword_total += rule.weight;
            hits.push(RuleHit {
                pattern: rule.pattern.clone(),
                weight: rule.weight,
            });
            if let Some(t) = &rule.tag {
                if !tags.contains(t) {
                    tags.push(t.clone());
                }
            }
        }
    }

    let length_penalty = if article.body.chars().count() < rules.length.min_chars {
        rules.length.penalty
    } else {
        0.0
    };

    ScoreBreakdown {
        base,
        hits,
        keyword_total,
        freshness_bonus: freshness_bonus(article.published_at, now, rules),
        length_penalty,
        tags,
    }
}

/// Debug-log a breakdown. Rule hits appear in declaration order so logs diff cleanly.
pub fn log_breakdown(article: &Article, b: &ScoreBreakdown) {
    let title: String = article.title.chars().take(60).collect();
    let hits: Vec<String> = b
        .hits
        .iter()
        .map(|h| format!("{}:{:+}", h.pattern, h.weight))
        .collect();
    debug!(
        target: "scoring",
        source = %article.source_id,
        %title,
        base = b.base,
        keywords = b.keyword_total,
        freshness = b.freshness_bonus,
        penalty = b.length_penalty,
        total = b.total(),
        hits = ?hits,
        "score breakdown"
    );
}

/// An article paired with its score breakdown.
#[derive(Debug, Clone)]
pub struct Scored {
    pub article: Article,
    pub breakdown: ScoreBreakdown,
}

impl Scored {
    pub fn score(&self) -> f64 {
        self.breakdown.total()
    }
}

/// Score a batch, preserving input order.
pub fn score_batch(
    articles: Vec<Article>,
    now: DateTime<Utc>,
    rules: &ScoringRules,
) -> Vec<Scored> {
    articles
        .into_iter()
        .map(|article| {
            let breakdown = score_article(&article, now, rules);
            log_breakdown(&article, &breakdown);
            Scored { article, breakdown }
        })
        .collect()
}
