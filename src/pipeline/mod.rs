// src/pipeline/mod.rs
//! Pipeline orchestrator.
//!
//! `Collected → Deduplicated → Scored/Selected → Translated → Summarized → Persisted`
//!
//! Dedup, scoring and selection are pure and synchronous; a broken invariant
//! there aborts the run as a logic error. Provider trouble never aborts: it
//! becomes fallback data, and a provider whose failure rate crosses the kill
//! switch threshold is skipped for the rest of the run, in favour of the
//! backup translator when one is configured. History is saved only after the
//! run record has been persisted.

pub mod enrichment;
pub mod stats;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::article::Article;
use crate::collect::{collect_all, Collector};
use crate::config::PipelineConfig;
use crate::dedup::{prune, Deduplicator, HistoryStore};
use crate::enrich::{DynSummarizer, DynTranslator, ProviderGuard, Providers};
use crate::error::{PipelineError, Stage};
use crate::metrics::{
    ensure_described, DEDUP_REJECTED_TOTAL, LAST_RUN_TS, SELECTED_TOTAL, STAGE_MS,
};
use crate::persist::{PersistenceSink, RunRecord};
use crate::scoring::{score_batch, select};
use enrichment::{summarize_stage, translate_stage, CallBudget, TranslatorSlot};

pub use stats::{RunOutcome, RunStats};

/// What a run hands back to its caller, whatever happened to the providers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub generated_at: DateTime<Utc>,
    /// Final articles in selection order.
    pub articles: Vec<Article>,
    pub stats: RunStats,
}

pub struct Pipeline {
    cfg: PipelineConfig,
    dedup: Deduplicator,
    history: Arc<dyn HistoryStore>,
    sink: Arc<dyn PersistenceSink>,
    collectors: Vec<Box<dyn Collector>>,
    translator: Option<DynTranslator>,
    backup_translator: Option<DynTranslator>,
    summarizer: Option<DynSummarizer>,
}

fn elapsed_ms(t: Instant) -> u64 {
    t.elapsed().as_millis() as u64
}

fn stage_done(stats: &mut RunStats, stage: Stage, t: Instant, input: usize, output: usize) {
    let ms = elapsed_ms(t);
    stats.record_stage(stage, ms);
    histogram!(STAGE_MS, "stage" => stage.as_str()).record(ms as f64);
    info!(target: "pipeline", stage = %stage, input, output, ms, "stage done");
}

impl Pipeline {
    pub fn new(
        cfg: PipelineConfig,
        history: Arc<dyn HistoryStore>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(cfg.dedup.clone()),
            cfg,
            history,
            sink,
            collectors: Vec::new(),
            translator: None,
            backup_translator: None,
            summarizer: None,
        }
    }

    pub fn with_collector(mut self, c: Box<dyn Collector>) -> Self {
        self.collectors.push(c);
        self
    }

    pub fn with_collectors(mut self, cs: Vec<Box<dyn Collector>>) -> Self {
        self.collectors.extend(cs);
        self
    }

    pub fn with_translator(mut self, t: DynTranslator) -> Self {
        self.translator = Some(t);
        self
    }

    /// Translator tried for a text after the primary one failed on it.
    pub fn with_backup_translator(mut self, t: DynTranslator) -> Self {
        self.backup_translator = Some(t);
        self
    }

    pub fn with_summarizer(mut self, s: DynSummarizer) -> Self {
        self.summarizer = Some(s);
        self
    }

    pub fn with_providers(mut self, p: Providers) -> Self {
        self.translator = p.translator;
        self.backup_translator = p.backup_translator;
        self.summarizer = p.summarizer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Run once with `now` as the reference time for retention and freshness.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        ensure_described();
        let started = Instant::now();
        let mut stats = RunStats::default();

        // Collected
        let t = Instant::now();
        let batch = collect_all(&self.collectors).await;
        stats.collected = batch.articles.len();
        stats.collector_errors = batch.errors;
        let collected = stats.collected;
        stage_done(&mut stats, Stage::Collect, t, self.collectors.len(), collected);

        if batch.articles.is_empty() {
            info!(target: "pipeline", collector_errors = stats.collector_errors, "nothing collected; skipping persistence");
            return Ok(RunReport {
                outcome: RunOutcome::NothingCollected,
                generated_at: now,
                articles: Vec::new(),
                stats,
            });
        }

        // Deduplicated
        let t = Instant::now();
        let mut history = self.history.load().await.map_err(|e| {
            error!(target: "pipeline", error = %format!("{e:#}"), "history load failed");
            PipelineError::History(e)
        })?;
        stats.history_loaded = history.len();
        stats.history_pruned = prune(&mut history, now, self.cfg.dedup.retention_days);

        let input = batch.articles.len();
        let dedup_out = self.dedup.filter_new(batch.articles, &mut history, now);
        if dedup_out.accepted.len() + dedup_out.rejected != input {
            return Err(self.fatal(PipelineError::logic(
                Stage::Dedup,
                format!(
                    "accepted {} + rejected {} != input {input}",
                    dedup_out.accepted.len(),
                    dedup_out.rejected
                ),
            )));
        }
        stats.dedup_rejected = dedup_out.rejected;
        stats.dedup_similar_title = dedup_out.similar_title;
        stats.dedup_unkeyed = dedup_out.unkeyed;
        stats.deduplicated = dedup_out.accepted.len();
        counter!(DEDUP_REJECTED_TOTAL).increment(dedup_out.rejected as u64);
        let deduplicated = stats.deduplicated;
        stage_done(&mut stats, Stage::Dedup, t, input, deduplicated);

        // Scored
        let t = Instant::now();
        let scored = score_batch(dedup_out.accepted, now, &self.cfg.rules);
        if let Some(bad) = scored.iter().find(|s| !s.score().is_finite()) {
            return Err(self.fatal(PipelineError::logic(
                Stage::Score,
                format!("non-finite score for article from {}", bad.article.source_id),
            )));
        }
        stage_done(&mut stats, Stage::Score, t, deduplicated, scored.len());

        // Selected
        let t = Instant::now();
        let selection = select(scored, &self.cfg.selection);
        selection
            .verify(&self.cfg.selection)
            .map_err(|e| self.fatal(e))?;
        stats.below_threshold = selection.below_threshold;
        stats.selected = selection.len();
        stats.redistributed = selection.redistributed;
        if stats.selected < self.cfg.selection.min_total {
            warn!(
                target: "select",
                selected = stats.selected,
                min_total = self.cfg.selection.min_total,
                qualified = selection.qualified,
                "selection below desired minimum"
            );
        }
        let mut articles: Vec<Article> = selection
            .items
            .into_iter()
            .map(|s| {
                let mut a = s.article;
                a.score = Some(s.breakdown.total());
                a.derived_tags = s.breakdown.tags;
                a
            })
            .collect();
        let selected = stats.selected;
        stage_done(&mut stats, Stage::Select, t, deduplicated, selected);

        // Translated
        let enrich = &self.cfg.enrichment;
        let t = Instant::now();
        let budget = CallBudget {
            timeout: enrich.call_timeout(),
            deadline: enrich.run_deadline().map(|d| t + d),
            permits: Arc::new(Semaphore::new(enrich.concurrency)),
        };
        let chain: Vec<TranslatorSlot> = [&self.translator, &self.backup_translator]
            .into_iter()
            .flatten()
            .map(|p| TranslatorSlot {
                translator: p.clone(),
                guard: Arc::new(ProviderGuard::new(
                    p.name(),
                    Stage::Translate,
                    enrich.kill_switch_rate,
                    enrich.kill_switch_min_calls,
                )),
            })
            .collect();
        let (translated, tr_fallbacks) =
            translate_stage(&mut articles, &chain, enrich, &budget).await;
        stats.translated = translated;
        stats.translation_fallbacks = tr_fallbacks;
        stage_done(&mut stats, Stage::Translate, t, articles.len(), translated);

        // Summarized
        let t = Instant::now();
        let sm_guard = self.summarizer.as_ref().map(|p| {
            Arc::new(ProviderGuard::new(
                p.name(),
                Stage::Summarize,
                enrich.kill_switch_rate,
                enrich.kill_switch_min_calls,
            ))
        });
        let (summarized, sm_fallbacks) = summarize_stage(
            &mut articles,
            self.summarizer.as_ref(),
            sm_guard.clone(),
            enrich,
            &budget,
        )
        .await;
        stats.summarized = summarized;
        stats.summary_fallbacks = sm_fallbacks;
        stage_done(&mut stats, Stage::Summarize, t, articles.len(), summarized);

        stats.deadline_expired = budget.expired();
        if stats.deadline_expired {
            warn!(target: "pipeline", "run deadline expired; remaining enrichment used fallbacks");
        }
        stats.providers = chain
            .iter()
            .map(|slot| slot.guard.stats())
            .chain(sm_guard.iter().map(|g| g.stats()))
            .collect();
        for p in stats.providers.iter().filter(|p| p.tripped) {
            warn!(target: "pipeline", provider = %p.provider, stage = %p.stage, failures = p.failures, calls = p.calls, "provider degraded for this run");
        }

        let outcome = if articles.is_empty() {
            RunOutcome::NoneSelected
        } else if stats.any_provider_tripped() || stats.deadline_expired {
            RunOutcome::Degraded
        } else {
            RunOutcome::Completed
        };

        // Persisted
        let t = Instant::now();
        let record = RunRecord::new(now, outcome, articles, stats.clone());
        self.sink.persist(&record).await.map_err(|e| {
            error!(target: "pipeline", error = %format!("{e:#}"), "persistence failed; history not saved");
            PipelineError::Persistence(e)
        })?;
        self.history.save(&history).await.map_err(|e| {
            error!(target: "pipeline", error = %format!("{e:#}"), "history save failed");
            PipelineError::History(e)
        })?;
        stage_done(&mut stats, Stage::Persist, t, record.articles.len(), record.articles.len());

        counter!(SELECTED_TOTAL).increment(record.articles.len() as u64);
        gauge!(LAST_RUN_TS).set(now.timestamp() as f64);
        info!(
            target: "pipeline",
            outcome = ?outcome,
            collected = stats.collected,
            deduplicated = stats.deduplicated,
            selected = stats.selected,
            translated = stats.translated,
            summarized = stats.summarized,
            ms = elapsed_ms(started),
            "run finished"
        );

        Ok(RunReport {
            outcome,
            generated_at: now,
            articles: record.articles,
            stats,
        })
    }

    fn fatal(&self, e: PipelineError) -> PipelineError {
        error!(target: "pipeline", error = %e, "aborting run on logic error");
        e
    }
}
