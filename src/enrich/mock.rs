// src/enrich/mock.rs
//! Deterministic provider for tests and local runs (`AI_TEST_MODE=mock`).

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::text::truncate_sentences;
use super::{Summarizer, Translator};

#[derive(Debug, Clone, PartialEq)]
pub enum MockMode {
    /// Translate by tagging with the target language; summarize by keeping
    /// the leading sentences.
    Succeed,
    /// Every call fails.
    Fail,
    /// Every n-th call (1-based) fails.
    FailEvery(u32),
    /// Calls succeed with an empty string.
    Empty,
    /// Calls sleep before succeeding.
    Slow(Duration),
    /// Call n sleeps `first - step * (n - 1)` (floored at zero), so later
    /// calls finish before earlier ones.
    Staggered { first: Duration, step: Duration },
}

#[derive(Debug)]
pub struct MockProvider {
    mode: MockMode,
    target_language: String,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            target_language: "ko".to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.target_language = lang.into();
        self
    }

    /// Calls received so far, across both roles.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, ok: String) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.mode {
            MockMode::Succeed => Ok(ok),
            MockMode::Fail => bail!("mock provider failure (call {n})"),
            MockMode::FailEvery(k) if *k > 0 && n % k == 0 => {
                bail!("mock provider failure (call {n})")
            }
            MockMode::FailEvery(_) => Ok(ok),
            MockMode::Empty => Ok(String::new()),
            MockMode::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(ok)
            }
            MockMode::Staggered { first, step } => {
                tokio::time::sleep(first.saturating_sub(*step * (n - 1))).await;
                Ok(ok)
            }
        }
    }
}

#[async_trait]
impl Translator for MockProvider {
    async fn translate(&self, text: &str, _source_lang_hint: Option<&str>) -> Result<String> {
        self.respond(format!("[{}] {}", self.target_language, text))
            .await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl Summarizer for MockProvider {
    async fn summarize(&self, text: &str, sentences: usize) -> Result<String> {
        let mut s = truncate_sentences(text, sentences);
        if s.is_empty() {
            s = "Mock summary.".to_string();
        }
        self.respond(s).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}
