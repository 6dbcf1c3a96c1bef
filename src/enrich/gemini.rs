// src/enrich/gemini.rs
//! Gemini provider (REST `generateContent`). Implements both translation and
//! summarization with one HTTP client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Summarizer, Translator};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    target_language: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: String,
        target_language: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ds-news-curator/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building gemini http client")?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model,
            target_language,
        })
    }

    /// Point at a different API root (proxies, local stubs).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn language_name(&self) -> &str {
        match self.target_language.as_str() {
            "ko" => "Korean",
            "en" => "English",
            "ja" => "Japanese",
            "zh" => "Chinese",
            other => other,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig {
            temperature: f32,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<RespContent>,
        }
        #[derive(Deserialize)]
        struct RespContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            #[serde(default)]
            text: String,
        }

        if self.api_key.is_empty() {
            bail!("gemini api key is empty");
        }

        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature: 0.2 },
        };
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("gemini returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("decoding gemini response")?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            bail!("gemini returned no text");
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Translator for GeminiProvider {
    async fn translate(&self, text: &str, source_lang_hint: Option<&str>) -> Result<String> {
        let from = source_lang_hint
            .map(|h| format!(" from {h}"))
            .unwrap_or_default();
        let prompt = format!(
            "Translate the following technical text{from} into natural {}. \
             Keep product names and code identifiers as they are. Output only the translation.\n\n{text}",
            self.language_name()
        );
        self.generate(&prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl Summarizer for GeminiProvider {
    async fn summarize(&self, text: &str, sentences: usize) -> Result<String> {
        let prompt = format!(
            "Summarize the following technical article in exactly {sentences} sentences of {}. \
             Cover the key point and the conclusion. Output only the summary.\n\n{text}",
            self.language_name()
        );
        self.generate(&prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
