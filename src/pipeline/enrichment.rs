// src/pipeline/enrichment.rs
//! Translation and summarization stages.
//!
//! Each article's provider call runs in its own task behind a semaphore.
//! Tasks only return results; the orchestrator writes them back in selection
//! order, so concurrency never reorders output. Every failure path ends in
//! fallback data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::article::{Article, Enrichment, FallbackReason};
use crate::enrich::text::{
    needs_translation, stub_summary, truncate_chars, truncate_sentences, Glossary,
};
use crate::enrich::{DynSummarizer, DynTranslator, EnrichmentConfig, ProviderGuard};

/// Shared limits for one enrichment stage.
#[derive(Clone)]
pub(crate) struct CallBudget {
    pub timeout: Duration,
    pub deadline: Option<Instant>,
    pub permits: Arc<Semaphore>,
}

impl CallBudget {
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// One provider call under the kill switch, the per-call timeout and the run
/// deadline. Empty responses count as malformed.
pub(crate) async fn guarded_call<F>(
    guard: &ProviderGuard,
    budget: &CallBudget,
    call: F,
) -> Result<String, FallbackReason>
where
    F: Future<Output = anyhow::Result<String>>,
{
    let now = Instant::now();
    let mut limit = budget.timeout;
    if let Some(d) = budget.deadline {
        if now >= d {
            guard.record_skipped();
            return Err(FallbackReason::Deadline);
        }
        limit = limit.min(d - now);
    }
    guard.admit()?;

    match tokio::time::timeout(limit, call).await {
        Ok(Ok(text)) if !text.trim().is_empty() => {
            guard.record_success();
            Ok(text.trim().to_string())
        }
        Ok(Ok(_)) => {
            debug!(target: "enrich", provider = guard.provider(), "empty provider response");
            guard.record_failure();
            Err(FallbackReason::ProviderError)
        }
        Ok(Err(e)) => {
            debug!(target: "enrich", provider = guard.provider(), error = %format!("{e:#}"), "provider call failed");
            guard.record_failure();
            Err(FallbackReason::ProviderError)
        }
        Err(_) if budget.expired() => {
            guard.record_skipped();
            Err(FallbackReason::Deadline)
        }
        Err(_) => {
            debug!(target: "enrich", provider = guard.provider(), timeout_ms = limit.as_millis() as u64, "provider call timed out");
            guard.record_failure();
            Err(FallbackReason::Timeout)
        }
    }
}

/// A translator and its kill switch. Slots are tried in order per text.
#[derive(Clone)]
pub(crate) struct TranslatorSlot {
    pub translator: DynTranslator,
    pub guard: Arc<ProviderGuard>,
}

/// Result of translating one article. A field that did not need translation
/// stays `None`.
#[derive(Debug)]
pub(crate) struct Translated {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Enrichment,
}

impl Translated {
    fn fallback(reason: FallbackReason) -> Self {
        Self {
            title: None,
            body: None,
            state: Enrichment::Fallback(reason),
        }
    }
}

/// Try each slot in turn. An expired deadline stops the chain.
async fn translate_text(
    chain: &[TranslatorSlot],
    budget: &CallBudget,
    text: &str,
    hint: Option<&str>,
) -> Result<String, FallbackReason> {
    let mut last = FallbackReason::Unavailable;
    for slot in chain {
        match guarded_call(&slot.guard, budget, slot.translator.translate(text, hint)).await {
            Ok(t) => return Ok(t),
            Err(FallbackReason::Deadline) => return Err(FallbackReason::Deadline),
            Err(reason) => {
                debug!(target: "enrich", provider = slot.guard.provider(), reason = %reason, "translator gave up on text");
                last = reason;
            }
        }
    }
    Err(last)
}

async fn translate_one(
    chain: Arc<[TranslatorSlot]>,
    budget: CallBudget,
    title: Option<String>,
    body: Option<String>,
    hint: Option<String>,
) -> Translated {
    let _permit = match budget.permits.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => return Translated::fallback(FallbackReason::Unavailable),
    };
    let hint = hint.as_deref();
    // the fields sent form one unit: if one fails, neither is kept
    let title = match title {
        Some(t) => match translate_text(&chain, &budget, &t, hint).await {
            Ok(t) => Some(t),
            Err(reason) => return Translated::fallback(reason),
        },
        None => None,
    };
    let body = match body {
        Some(b) => match translate_text(&chain, &budget, &b, hint).await {
            Ok(t) => Some(t),
            Err(reason) => return Translated::fallback(reason),
        },
        None => None,
    };
    Translated {
        title,
        body,
        state: Enrichment::Completed,
    }
}

/// Translate every title and body that is not already in the target language.
/// Returns how many articles were translated and how many fell back.
pub(crate) async fn translate_stage(
    articles: &mut [Article],
    chain: &[TranslatorSlot],
    cfg: &EnrichmentConfig,
    budget: &CallBudget,
) -> (usize, usize) {
    let target = cfg.target_language.as_str();
    let glossary = Glossary::new(&cfg.glossary);
    let chain: Arc<[TranslatorSlot]> = chain.to_vec().into();
    let mut handles: Vec<(usize, JoinHandle<Translated>)> = Vec::new();
    let mut fallbacks = 0;

    for (idx, a) in articles.iter_mut().enumerate() {
        let hint = a.language.as_deref();
        let title = needs_translation(&a.title, hint, target).then(|| a.title.clone());
        let body = needs_translation(&a.body, hint, target).then(|| {
            if a.body.chars().count() > cfg.max_translate_chars {
                truncate_chars(&a.body, cfg.max_translate_chars / 2).to_string()
            } else {
                a.body.clone()
            }
        });
        if title.is_none() && body.is_none() {
            a.translation = Enrichment::NotNeeded;
            continue;
        }
        if chain.is_empty() {
            a.translation = Enrichment::Fallback(FallbackReason::Unavailable);
            fallbacks += 1;
            continue;
        }
        let h = tokio::spawn(translate_one(
            chain.clone(),
            budget.clone(),
            title,
            body,
            a.language.clone(),
        ));
        handles.push((idx, h));
    }

    let mut translated = 0;
    for (idx, h) in handles {
        let out = h.await.unwrap_or_else(|e| {
            warn!(target: "enrich", error = %e, "translation task failed");
            Translated::fallback(FallbackReason::ProviderError)
        });
        let a = &mut articles[idx];
        a.translation = out.state;
        match out.state {
            Enrichment::Completed => {
                a.title_translated = out.title.map(|t| glossary.apply(&t));
                a.body_translated = out.body.map(|b| glossary.apply(&b));
                translated += 1;
            }
            _ => {
                if let Some(slot) = chain.first() {
                    slot.guard.record_fallback();
                }
                fallbacks += 1;
            }
        }
    }
    (translated, fallbacks)
}

/// Result of summarizing one article.
#[derive(Debug)]
pub(crate) struct Summarized {
    pub summary: Option<String>,
    pub state: Enrichment,
}

async fn summarize_one(
    summarizer: DynSummarizer,
    guard: Arc<ProviderGuard>,
    budget: CallBudget,
    input: String,
    sentences: usize,
) -> Summarized {
    let _permit = match budget.permits.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
            return Summarized {
                summary: None,
                state: Enrichment::Fallback(FallbackReason::Unavailable),
            }
        }
    };
    match guarded_call(&guard, &budget, summarizer.summarize(&input, sentences)).await {
        Ok(raw) => {
            let trimmed = truncate_sentences(&raw, sentences);
            let summary = if trimmed.is_empty() { raw } else { trimmed };
            Summarized {
                summary: Some(summary),
                state: Enrichment::Completed,
            }
        }
        Err(reason) => Summarized {
            summary: None,
            state: Enrichment::Fallback(reason),
        },
    }
}

/// Summarize every article. Afterwards every article has a non-empty summary.
/// Returns how many summaries came from the provider and how many fell back.
pub(crate) async fn summarize_stage(
    articles: &mut [Article],
    summarizer: Option<&DynSummarizer>,
    guard: Option<Arc<ProviderGuard>>,
    cfg: &EnrichmentConfig,
    budget: &CallBudget,
) -> (usize, usize) {
    let mut handles: Vec<(usize, JoinHandle<Summarized>)> = Vec::new();
    let mut fallbacks = 0;

    for (idx, a) in articles.iter_mut().enumerate() {
        if a.display_body().chars().count() < cfg.summary_min_body_chars {
            a.summary = Some(stub_summary(a.display_title(), a.display_body(), &a.url));
            a.summarization = Enrichment::NotNeeded;
            continue;
        }
        let (Some(sm), Some(g)) = (summarizer, guard.as_ref()) else {
            a.summary = Some(stub_summary(a.display_title(), a.display_body(), &a.url));
            a.summarization = Enrichment::Fallback(FallbackReason::Unavailable);
            fallbacks += 1;
            continue;
        };
        let input = format!("{}\n\n{}", a.display_title(), a.display_body());
        let h = tokio::spawn(summarize_one(
            sm.clone(),
            g.clone(),
            budget.clone(),
            input,
            cfg.summary_sentences,
        ));
        handles.push((idx, h));
    }

    let mut summarized = 0;
    for (idx, h) in handles {
        let out = h.await.unwrap_or_else(|e| {
            warn!(target: "enrich", error = %e, "summarization task failed");
            Summarized {
                summary: None,
                state: Enrichment::Fallback(FallbackReason::ProviderError),
            }
        });
        let a = &mut articles[idx];
        a.summarization = out.state;
        match (out.state, out.summary) {
            (Enrichment::Completed, Some(s)) => {
                a.summary = Some(s);
                summarized += 1;
            }
            _ => {
                a.summary = Some(stub_summary(a.display_title(), a.display_body(), &a.url));
                if let Some(g) = guard.as_ref() {
                    g.record_fallback();
                }
                fallbacks += 1;
            }
        }
    }
    (summarized, fallbacks)
}
