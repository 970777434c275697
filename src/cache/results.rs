//! Scan result cache keyed by file path and content hash
//!
//! Each file keeps a ring buffer of recent (hash, findings) pairs. The whole
//! store carries a single date stamp; the first access on a new local day
//! wipes everything.

use crate::cache::ring::RingBuffer;
use crate::error::{VigilError, VigilResult};
use crate::scan::Finding;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Results kept per file
pub const ENTRIES_PER_FILE: usize = 10;

/// SHA256 of document text, hex encoded
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// A cached scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub file_path: PathBuf,
    pub findings: Vec<Finding>,
}

/// Workspace result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCache {
    cache_date: Option<NaiveDate>,
    files: HashMap<PathBuf, RingBuffer<CacheEntry>>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    ENTRIES_PER_FILE
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_capacity(ENTRIES_PER_FILE)
    }

    /// Cache holding `capacity` results per file
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_date: None,
            files: HashMap::new(),
            capacity,
        }
    }

    /// Look up findings for this exact content
    pub fn get(&mut self, hash: &str, path: &Path) -> Option<CacheEntry> {
        self.get_on(Local::now().date_naive(), hash, path)
    }

    /// Store findings for this content; a known hash is left untouched
    pub fn put(&mut self, hash: &str, path: &Path, findings: Vec<Finding>) {
        self.put_on(Local::now().date_naive(), hash, path, findings)
    }

    pub(crate) fn get_on(&mut self, today: NaiveDate, hash: &str, path: &Path) -> Option<CacheEntry> {
        self.roll_over(today);
        self.files
            .get(path)?
            .find(|entry| entry.content_hash == hash)
            .cloned()
    }

    pub(crate) fn put_on(
        &mut self,
        today: NaiveDate,
        hash: &str,
        path: &Path,
        findings: Vec<Finding>,
    ) {
        self.roll_over(today);
        let capacity = self.capacity;
        let ring = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| RingBuffer::new(capacity));

        if ring.find(|entry| entry.content_hash == hash).is_some() {
            return;
        }

        if let Some(evicted) = ring.push(CacheEntry {
            content_hash: hash.to_string(),
            file_path: path.to_path_buf(),
            findings,
        }) {
            debug!(
                "Evicted cached result {} for {}",
                &evicted.content_hash[..12.min(evicted.content_hash.len())],
                path.display()
            );
        }
    }

    /// Drop every cached result
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Number of cached results for a file
    pub fn len_for(&self, path: &Path) -> usize {
        self.files.get(path).map_or(0, RingBuffer::len)
    }

    /// Total number of cached results
    pub fn total_entries(&self) -> usize {
        self.files.values().map(RingBuffer::len).sum()
    }

    pub fn cache_date(&self) -> Option<NaiveDate> {
        self.cache_date
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if self.cache_date != Some(today) {
            if !self.files.is_empty() {
                debug!("Result cache is from {:?}, clearing", self.cache_date);
            }
            self.files.clear();
            self.cache_date = Some(today);
        }
    }

    /// Load a persisted cache, falling back to an empty one
    pub async fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => return Self::new(),
        };

        match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Ignoring corrupt result cache {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Serialize for persistence
    pub fn to_json(&self) -> VigilResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write serialized cache contents to disk
    pub async fn write_json(path: &Path, json: String) -> VigilResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VigilError::io("creating workspace state directory", e))?;
        }
        fs::write(path, json)
            .await
            .map_err(|e| VigilError::io(format!("writing result cache {}", path.display()), e))
    }
}
