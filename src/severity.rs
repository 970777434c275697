//! Check severity mappings
//!
//! Findings without a scanner-provided severity are enriched from a
//! check-id to severity table. The table is fetched from a remote document
//! with bounded retries; any failure falls back to the copy bundled into
//! the binary.

use crate::error::{VigilError, VigilResult};
use crate::scan::Severity;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

const BUNDLED_MAPPINGS: &str = include_str!("../assets/severities.json");

/// Attempts made for a remote fetch
pub const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BASE_DELAY: Duration = Duration::from_millis(500);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a mapping table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    Remote,
    Bundled,
}

/// Check-id to severity table
#[derive(Debug, Clone)]
pub struct SeverityMap {
    version: String,
    source: MappingSource,
    mappings: HashMap<String, Severity>,
}

#[derive(Debug, Deserialize)]
struct MappingDocument {
    metadata: MappingMetadata,
    mappings: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct MappingMetadata {
    version: String,
    timestamp: String,
    total_mappings: usize,
}

impl SeverityMap {
    /// Parse and validate a mapping document
    pub fn parse(json: &str, source: MappingSource) -> VigilResult<Self> {
        let doc: MappingDocument = serde_json::from_str(json)?;

        if doc.metadata.total_mappings != doc.mappings.len() {
            return Err(VigilError::Internal(format!(
                "severity mapping declares {} entries but has {}",
                doc.metadata.total_mappings,
                doc.mappings.len()
            )));
        }

        let mappings = doc
            .mappings
            .into_iter()
            .map(|(check, sev)| {
                sev.parse::<Severity>()
                    .map(|sev| (check.clone(), sev))
                    .map_err(|e| VigilError::Internal(format!("{}: {}", check, e)))
            })
            .collect::<VigilResult<HashMap<_, _>>>()?;

        Ok(Self {
            version: doc.metadata.version,
            source,
            mappings,
        })
    }

    /// The table compiled into the binary
    pub fn bundled() -> Self {
        Self::parse(BUNDLED_MAPPINGS, MappingSource::Bundled).unwrap_or_else(|e| {
            warn!("Bundled severity mappings are invalid: {}", e);
            Self::empty()
        })
    }

    pub fn empty() -> Self {
        Self {
            version: String::new(),
            source: MappingSource::Bundled,
            mappings: HashMap::new(),
        }
    }

    pub fn get(&self, check_id: &str) -> Option<Severity> {
        self.mappings.get(check_id).copied()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source(&self) -> MappingSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Retry `op` with exponential backoff between attempts
pub async fn with_backoff<T, F, Fut>(attempts: u32, base_delay: Duration, mut op: F) -> VigilResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VigilResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                let delay = base_delay * 2u32.pow(attempt);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn fetch_blocking(url: &str) -> VigilResult<String> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(FETCH_TIMEOUT))
        .build()
        .into();

    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| VigilError::NetworkUnavailable(format!("{}: {}", url, e)))?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| VigilError::NetworkUnavailable(format!("{}: {}", url, e)))
}

async fn fetch_remote(url: &str) -> VigilResult<SeverityMap> {
    with_backoff(FETCH_ATTEMPTS, FETCH_BASE_DELAY, || {
        let url = url.to_string();
        async move {
            let body = tokio::task::spawn_blocking(move || fetch_blocking(&url))
                .await
                .map_err(|e| VigilError::Internal(format!("fetch task failed: {}", e)))??;
            SeverityMap::parse(&body, MappingSource::Remote)
        }
    })
    .await
}

/// Load mappings from `url`, falling back to the bundled table
///
/// An empty URL skips the network entirely.
pub async fn load_severity_map(url: &str) -> SeverityMap {
    if url.trim().is_empty() {
        return SeverityMap::bundled();
    }

    match fetch_remote(url).await {
        Ok(map) => {
            info!("Loaded {} severity mappings (version {})", map.len(), map.version());
            map
        }
        Err(e) => {
            warn!("Using bundled severity mappings: {}", e);
            SeverityMap::bundled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn bundled_mappings_are_valid() {
        let map = SeverityMap::bundled();
        assert_eq!(map.source(), MappingSource::Bundled);
        assert!(!map.is_empty());
        assert_eq!(map.get("CKV_AWS_20"), Some(Severity::High));
        assert_eq!(map.get("CKV_NOPE"), None);
    }

    #[test]
    fn rejects_unknown_severity() {
        let json = r#"{"metadata": {"version": "1", "timestamp": "t", "total_mappings": 1},
                       "mappings": {"CKV_1": "SEVERE"}}"#;
        assert!(SeverityMap::parse(json, MappingSource::Remote).is_err());
    }

    #[test]
    fn rejects_count_mismatch() {
        let json = r#"{"metadata": {"version": "1", "timestamp": "t", "total_mappings": 5},
                       "mappings": {"CKV_1": "LOW"}}"#;
        assert!(SeverityMap::parse(json, MappingSource::Remote).is_err());
    }

    #[test]
    fn rejects_missing_metadata() {
        let json = r#"{"mappings": {"CKV_1": "LOW"}}"#;
        assert!(SeverityMap::parse(json, MappingSource::Remote).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(500), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(VigilError::NetworkUnavailable("offline".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: VigilResult<()> = with_backoff(3, Duration::from_millis(500), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(VigilError::NetworkUnavailable("offline".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_url_uses_bundled() {
        let map = load_severity_map("").await;
        assert_eq!(map.source(), MappingSource::Bundled);
    }
}
