// src/dedup/history.rs
//! Persisted identity history with retention-aware records.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Identity;

const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub first_seen: DateTime<Utc>,
    /// Normalized title, kept only when title similarity is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl DedupRecord {
    pub fn new(first_seen: DateTime<Utc>, title: Option<String>) -> Self {
        Self { first_seen, title }
    }
}

/// Identities accepted so far, keyed for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentitySet {
    entries: BTreeMap<Identity, DedupRecord>,
}

impl IdentitySet {
    pub fn contains(&self, id: &Identity) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert `id`; an existing record keeps its original first-seen time.
    /// Returns `true` if the identity was new.
    pub fn insert(&mut self, id: Identity, record: DedupRecord) -> bool {
        use std::collections::btree_map::Entry;
        match self.entries.entry(id) {
            Entry::Vacant(v) => {
                v.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, id: &Identity) -> Option<&DedupRecord> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.values().filter_map(|r| r.title.as_deref())
    }

    /// Keep records first seen at or after `cutoff`; returns how many were dropped.
    pub fn retain_since(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| r.first_seen >= cutoff);
        before - self.entries.len()
    }
}

/// Load/save contract for the identity history. Single writer per store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> Result<IdentitySet>;
    async fn save(&self, set: &IdentitySet) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    entries: IdentitySet,
}

/// JSON file store. A missing file loads as an empty history.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self) -> Result<IdentitySet> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IdentitySet::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let file: HistoryFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        if file.version != HISTORY_VERSION {
            bail!(
                "unsupported history version {} in {}",
                file.version,
                self.path.display()
            );
        }
        Ok(file.entries)
    }

    async fn save(&self, set: &IdentitySet) -> Result<()> {
        let file = HistoryFile {
            version: HISTORY_VERSION,
            entries: set.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).context("serializing history")?;
        crate::persist::write_atomic(&self.path, &json).await
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<IdentitySet>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(set: IdentitySet) -> Self {
        Self {
            inner: Mutex::new(set),
        }
    }

    pub fn snapshot(&self) -> IdentitySet {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Result<IdentitySet> {
        Ok(self.snapshot())
    }

    async fn save(&self, set: &IdentitySet) -> Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("history mutex poisoned"))?;
        *g = set.clone();
        Ok(())
    }
}
