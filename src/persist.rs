// src/persist.rs
//! Persistence sink for finished runs.
//!
//! The record shape is versioned; layout on disk is the sink's business.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::article::Article;
use crate::pipeline::stats::{RunOutcome, RunStats};

pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// What a sink receives: the final selection plus run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub schema_version: u32,
    /// Run date (UTC), used for archive naming.
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub articles: Vec<Article>,
    pub stats: RunStats,
}

impl RunRecord {
    pub fn new(
        generated_at: DateTime<Utc>,
        outcome: RunOutcome,
        articles: Vec<Article>,
        stats: RunStats,
    ) -> Self {
        Self {
            schema_version: RECORD_SCHEMA_VERSION,
            date: generated_at.date_naive(),
            generated_at,
            outcome,
            articles,
            stats,
        }
    }
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store the record. Retrying is the sink's concern.
    async fn persist(&self, record: &RunRecord) -> Result<()>;
}

/// Writes `articles.json` (latest run) and `articles_<date>.json` (archive).
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join("articles.json")
    }

    pub fn archive_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("articles_{}.json", date.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn persist(&self, record: &RunRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("serializing run record")?;
        let archive = self.archive_path(record.date);
        write_atomic(&archive, &json).await?;
        let latest = self.latest_path();
        write_atomic(&latest, &json).await?;
        info!(
            target: "persist",
            latest = %latest.display(),
            archive = %archive.display(),
            articles = record.articles.len(),
            "run persisted"
        );
        Ok(())
    }
}

/// Keeps records in memory; can be told to fail. For tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Mutex<Vec<RunRecord>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `persist` fails.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn persist(&self, record: &RunRecord) -> Result<()> {
        if self.fail {
            anyhow::bail!("memory sink configured to fail");
        }
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("sink mutex poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Write via a temp file + rename so readers never see a partial file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
