// src/scoring/select.rs
//! Tier-balanced selection over scored articles.
//!
//! Steps: threshold, partition by tier, rank each tier, allocate quotas by
//! largest remainder over `max_total`, optionally hand unused slots to the
//! best leftovers of other tiers, emit grouped by `tier_order`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::Scored;
use crate::article::{SourceTag, TierMap};
use crate::error::{ConfigError, PipelineError, Stage};

const PROPORTION_TOLERANCE: f64 = 0.01;

fn default_tier_order() -> Vec<SourceTag> {
    SourceTag::ALL.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Articles scoring below this are discarded.
    pub min_score: f64,
    /// Hard cap on the selection size.
    pub max_total: usize,
    /// Lower end of the desired range; falling short only warns.
    pub min_total: usize,
    /// Target share of `max_total` per tier. Must sum to 1.0.
    pub proportions: TierMap<f64>,
    /// Give slots a tier cannot fill to the best remaining articles of other tiers.
    pub redistribute: bool,
    /// Order in which tiers are emitted.
    #[serde(default = "default_tier_order")]
    pub tier_order: Vec<SourceTag>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_score: 70.0,
            max_total: 10,
            min_total: 5,
            proportions: TierMap {
                news_media: 0.5,
                practical_blog: 0.3,
                company_blog: 0.2,
            },
            redistribute: true,
            tier_order: default_tier_order(),
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_score.is_finite() {
            return Err(ConfigError::invalid("selection.min_score", "not finite"));
        }
        if self.max_total == 0 {
            return Err(ConfigError::invalid("selection.max_total", "must be >= 1"));
        }
        if self.min_total > self.max_total {
            return Err(ConfigError::invalid(
                "selection.min_total",
                format!("{} exceeds max_total {}", self.min_total, self.max_total),
            ));
        }
        let mut sum = 0.0;
        for tag in SourceTag::ALL {
            let p = *self.proportions.get(tag);
            if !p.is_finite() || p < 0.0 {
                return Err(ConfigError::InvalidProportions(format!(
                    "{tag} share {p} must be finite and non-negative"
                )));
            }
            sum += p;
        }
        if (sum - 1.0).abs() > PROPORTION_TOLERANCE {
            return Err(ConfigError::InvalidProportions(format!(
                "shares sum to {sum:.3}, expected 1.0"
            )));
        }
        let mut order = self.tier_order.clone();
        order.sort();
        order.dedup();
        if order.len() != SourceTag::ALL.len() || self.tier_order.len() != SourceTag::ALL.len() {
            return Err(ConfigError::invalid(
                "selection.tier_order",
                "must list every tier exactly once",
            ));
        }
        Ok(())
    }

    fn tier_rank(&self, tag: SourceTag) -> usize {
        self.tier_order
            .iter()
            .position(|t| *t == tag)
            .unwrap_or(self.tier_order.len())
    }

    /// Slots per tier: largest remainder of `max_total * share`, ties broken by
    /// tier order. Always sums to `max_total`.
    pub fn quotas(&self) -> TierMap<usize> {
        let sum: f64 = SourceTag::ALL.iter().map(|t| *self.proportions.get(*t)).sum();
        let mut out = TierMap::<usize>::default();
        if sum <= 0.0 {
            return out;
        }
        let mut remainders: Vec<(SourceTag, f64)> = Vec::with_capacity(3);
        let mut assigned = 0usize;
        for tag in self.tier_order.iter().copied() {
            let raw = self.max_total as f64 * (*self.proportions.get(tag) / sum);
            let whole = (raw.floor() as usize).min(self.max_total - assigned);
            *out.get_mut(tag) = whole;
            assigned += whole;
            remainders.push((tag, raw - raw.floor()));
        }
        // stable sort keeps tier order among equal remainders
        remainders.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (tag, _) in remainders.iter().cycle().take(self.max_total - assigned) {
            *out.get_mut(*tag) += 1;
        }
        out
    }
}

/// Ranking used within a tier and for redistribution: score desc, newer
/// publication first (undated last), then input position.
fn rank(a: &(usize, Scored), b: &(usize, Scored)) -> Ordering {
    b.1.score()
        .total_cmp(&a.1.score())
        .then_with(|| match (a.1.article.published_at, b.1.article.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.0.cmp(&b.0))
}

#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    /// Final list, grouped by tier order, best first within each tier.
    pub items: Vec<Scored>,
    /// Articles discarded by the threshold.
    pub below_threshold: usize,
    /// Articles that passed the threshold.
    pub qualified: usize,
    pub quotas: TierMap<usize>,
    /// Selected per tier (after redistribution).
    pub per_tier: TierMap<usize>,
    /// Slots filled by redistribution.
    pub redistributed: usize,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check the post-conditions: threshold, cap, finite scores and emit order.
    pub fn verify(&self, cfg: &SelectionConfig) -> Result<(), PipelineError> {
        if self.items.len() > cfg.max_total {
            return Err(PipelineError::logic(
                Stage::Select,
                format!("selected {} > max_total {}", self.items.len(), cfg.max_total),
            ));
        }
        let mut last: Option<(usize, f64)> = None;
        for s in &self.items {
            let score = s.score();
            if !score.is_finite() || score < cfg.min_score {
                return Err(PipelineError::logic(
                    Stage::Select,
                    format!(
                        "article from {} has score {score} below min_score {}",
                        s.article.source_id, cfg.min_score
                    ),
                ));
            }
            let tier = cfg.tier_rank(s.article.tag);
            if let Some((prev_tier, prev_score)) = last {
                if tier < prev_tier || (tier == prev_tier && score > prev_score) {
                    return Err(PipelineError::logic(
                        Stage::Select,
                        "selection is not grouped by tier in descending score order",
                    ));
                }
            }
            last = Some((tier, score));
        }
        Ok(())
    }
}

/// Select a bounded, tier-balanced subset. Deterministic for identical input.
pub fn select(scored: Vec<Scored>, cfg: &SelectionConfig) -> SelectionResult {
    let total_in = scored.len();
    let mut tiers: TierMap<Vec<(usize, Scored)>> = TierMap::default();
    for (idx, s) in scored.into_iter().enumerate() {
        if s.score() >= cfg.min_score {
            tiers.get_mut(s.article.tag).push((idx, s));
        }
    }
    let qualified: usize = SourceTag::ALL.iter().map(|t| tiers.get(*t).len()).sum();

    let quotas = cfg.quotas();
    let mut chosen: TierMap<Vec<(usize, Scored)>> = TierMap::default();
    let mut leftovers: Vec<(usize, Scored)> = Vec::new();
    for tag in SourceTag::ALL {
        let mut pool = std::mem::take(tiers.get_mut(tag));
        pool.sort_by(rank);
        let take = (*quotas.get(tag)).min(pool.len());
        leftovers.extend(pool.split_off(take));
        *chosen.get_mut(tag) = pool;
    }

    let mut redistributed = 0;
    if cfg.redistribute {
        let filled: usize = SourceTag::ALL.iter().map(|t| chosen.get(*t).len()).sum();
        let free = cfg.max_total.saturating_sub(filled);
        leftovers.sort_by(rank);
        for item in leftovers.into_iter().take(free) {
            chosen.get_mut(item.1.article.tag).push(item);
            redistributed += 1;
        }
    }

    let mut per_tier = TierMap::<usize>::default();
    let mut items = Vec::with_capacity(cfg.max_total);
    for tag in cfg.tier_order.iter().copied() {
        let mut group = std::mem::take(chosen.get_mut(tag));
        group.sort_by(rank);
        *per_tier.get_mut(tag) = group.len();
        items.extend(group.into_iter().map(|(_, s)| s));
    }
    items.truncate(cfg.max_total);

    SelectionResult {
        items,
        below_threshold: total_in - qualified,
        qualified,
        quotas,
        per_tier,
        redistributed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use crate::scoring::{RuleHit, ScoreBreakdown};
    use chrono::{Duration, TimeZone, Utc};

    fn scored(id: &str, tag: SourceTag, score: f64) -> Scored {
        Scored {
            article: Article::new(id, format!("https://x.test/{id}"), id, "", tag),
            breakdown: ScoreBreakdown {
                base: score,
                hits: Vec::<RuleHit>::new(),
                keyword_total: 0.0,
                freshness_bonus: 0.0,
                length_penalty: 0.0,
                tags: vec![],
            },
        }
    }

    fn ids(r: &SelectionResult) -> Vec<&str> {
        r.items.iter().map(|s| s.article.source_id.as_str()).collect()
    }

    #[test]
    fn quotas_use_largest_remainder() {
        let cfg = SelectionConfig {
            max_total: 9,
            ..Default::default()
        };
        let q = cfg.quotas();
        assert_eq!((q.news_media, q.practical_blog, q.company_blog), (4, 3, 2));
        let q10 = SelectionConfig::default().quotas();
        assert_eq!((q10.news_media, q10.practical_blog, q10.company_blog), (5, 3, 2));
        let q7 = SelectionConfig {
            max_total: 7,
            ..Default::default()
        }
        .quotas();
        assert_eq!(q7.news_media + q7.practical_blog + q7.company_blog, 7);
    }

    #[test]
    fn threshold_and_cap_hold() {
        let cfg = SelectionConfig {
            max_total: 3,
            min_total: 1,
            ..Default::default()
        };
        let input = vec![
            scored("n1", SourceTag::NewsMedia, 120.0),
            scored("n2", SourceTag::NewsMedia, 69.9),
            scored("n3", SourceTag::NewsMedia, 70.0),
            scored("p1", SourceTag::PracticalBlog, 90.0),
            scored("p2", SourceTag::PracticalBlog, 95.0),
            scored("c1", SourceTag::CompanyBlog, 71.0),
        ];
        let r = select(input, &cfg);
        assert_eq!(r.below_threshold, 1);
        assert!(r.len() <= 3);
        assert!(r.items.iter().all(|s| s.score() >= 70.0));
        r.verify(&cfg).unwrap();
    }

    #[test]
    fn grouped_by_tier_then_score() {
        let cfg = SelectionConfig::default();
        let input = vec![
            scored("c1", SourceTag::CompanyBlog, 100.0),
            scored("n1", SourceTag::NewsMedia, 80.0),
            scored("p1", SourceTag::PracticalBlog, 85.0),
            scored("n2", SourceTag::NewsMedia, 110.0),
        ];
        let r = select(input, &cfg);
        assert_eq!(ids(&r), vec!["n2", "n1", "p1", "c1"]);
        r.verify(&cfg).unwrap();
    }

    #[test]
    fn unused_slots_go_to_best_leftovers_when_enabled() {
        let mut cfg = SelectionConfig {
            max_total: 4,
            min_total: 1,
            ..Default::default()
        };
        // quotas 2/1/1, company tier empty
        let input = vec![
            scored("n1", SourceTag::NewsMedia, 100.0),
            scored("n2", SourceTag::NewsMedia, 99.0),
            scored("n3", SourceTag::NewsMedia, 98.0),
            scored("p1", SourceTag::PracticalBlog, 90.0),
            scored("p2", SourceTag::PracticalBlog, 97.0),
        ];
        let r = select(input.clone(), &cfg);
        assert_eq!(ids(&r), vec!["n1", "n2", "n3", "p2"]);
        assert_eq!(r.redistributed, 1);

        cfg.redistribute = false;
        let r = select(input, &cfg);
        assert_eq!(ids(&r), vec!["n1", "n2", "p2"]);
        assert_eq!(r.redistributed, 0);
    }

    #[test]
    fn ties_break_on_recency_then_input_order() {
        let cfg = SelectionConfig::default();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut a = scored("old", SourceTag::NewsMedia, 80.0);
        a.article.published_at = Some(t - Duration::days(2));
        let mut b = scored("new", SourceTag::NewsMedia, 80.0);
        b.article.published_at = Some(t);
        let c = scored("undated1", SourceTag::NewsMedia, 80.0);
        let d = scored("undated2", SourceTag::NewsMedia, 80.0);
        let r = select(vec![c, a, d, b], &cfg);
        assert_eq!(ids(&r), vec!["new", "old", "undated1", "undated2"]);
    }

    #[test]
    fn empty_input_is_empty_selection() {
        let r = select(vec![], &SelectionConfig::default());
        assert!(r.is_empty());
        assert_eq!(r.below_threshold, 0);
    }

    #[test]
    fn verify_catches_threshold_violation() {
        let cfg = SelectionConfig::default();
        let bad = SelectionResult {
            items: vec![scored("x", SourceTag::NewsMedia, 10.0)],
            ..Default::default()
        };
        assert!(matches!(
            bad.verify(&cfg),
            Err(PipelineError::Logic { stage: Stage::Select, .. })
        ));
    }

    #[test]
    fn proportions_and_order_validated() {
        assert!(SelectionConfig::default().validate().is_ok());
        let bad = SelectionConfig {
            proportions: TierMap {
                news_media: 0.5,
                practical_blog: 0.5,
                company_blog: 0.5,
            },
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidProportions(_))));
        let dup = SelectionConfig {
            tier_order: vec![SourceTag::NewsMedia, SourceTag::NewsMedia, SourceTag::CompanyBlog],
            ..Default::default()
        };
        assert!(dup.validate().is_err());
    }
}
