//! Scanner version resolution for container installs
//!
//! `latest` is resolved to the version embedded in the image and cached for
//! an hour. When no image is tagged with that version the pull/run tag stays
//! `latest` while the discovered version is kept for display.

use crate::error::{VigilError, VigilResult};
use crate::orchestration::ContainerRuntime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

/// The floating version tag
pub const LATEST: &str = "latest";

/// How long a resolved `latest` stays valid
pub const VERSION_CACHE_TTL_SECS: i64 = 60 * 60;

/// Check a requested version before any install strategy runs
pub fn validate_requested_version(requested: &str) -> VigilResult<()> {
    if requested == LATEST {
        return Ok(());
    }
    semver::Version::parse(requested)
        .map(|_| ())
        .map_err(|e| VigilError::InvalidVersion {
            version: requested.to_string(),
            reason: e.to_string(),
        })
}

/// Outcome of resolving a requested version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Version shown to the user
    pub version: String,
    /// Tag used to pull and run the image
    pub resolved_version: String,
}

impl ResolvedVersion {
    pub fn exact(version: &str) -> Self {
        Self {
            version: version.to_string(),
            resolved_version: version.to_string(),
        }
    }

    pub fn latest() -> Self {
        Self::exact(LATEST)
    }
}

/// Persisted resolution of a requested version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCacheEntry {
    pub requested_version: String,
    pub resolved_version: String,
    pub display_version: String,
    pub timestamp: DateTime<Utc>,
}

impl VersionCacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < Duration::seconds(VERSION_CACHE_TTL_SECS)
    }
}

/// Single-slot version resolution cache
#[derive(Debug, Default)]
pub struct VersionCache {
    slot: Mutex<Option<VersionCacheEntry>>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted entry
    pub fn with_entry(entry: Option<VersionCacheEntry>) -> Self {
        Self {
            slot: Mutex::new(entry),
        }
    }

    /// Cached resolution for `requested`, if younger than the TTL
    pub fn lookup(&self, requested: &str, now: DateTime<Utc>) -> Option<ResolvedVersion> {
        let slot = self.slot.lock().ok()?;
        slot.as_ref()
            .filter(|entry| entry.requested_version == requested && entry.is_fresh(now))
            .map(|entry| ResolvedVersion {
                version: entry.display_version.clone(),
                resolved_version: entry.resolved_version.clone(),
            })
    }

    pub fn store(&self, requested: &str, resolved: &ResolvedVersion, now: DateTime<Utc>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(VersionCacheEntry {
                requested_version: requested.to_string(),
                resolved_version: resolved.resolved_version.clone(),
                display_version: resolved.version.clone(),
                timestamp: now,
            });
        }
    }

    /// Forget any cached resolution
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    /// Current entry, for persistence
    pub fn snapshot(&self) -> Option<VersionCacheEntry> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Pull the version out of `--version` output
///
/// The scanner may print warnings first, so the last non-empty line wins.
pub fn parse_version_output(output: &str) -> VigilResult<String> {
    let line = output
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| VigilError::VersionResolution("empty version output".to_string()))?;

    let candidate = line
        .split_whitespace()
        .last()
        .unwrap_or(line)
        .trim_start_matches('v');

    semver::Version::parse(candidate)
        .map(|v| v.to_string())
        .map_err(|e| VigilError::VersionResolution(format!("'{}': {}", line, e)))
}

/// Resolves requested versions against a container image
pub struct VersionResolver<'a> {
    runtime: &'a dyn ContainerRuntime,
    cache: &'a VersionCache,
    image: &'a str,
    executable: &'a str,
}

impl<'a> VersionResolver<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        cache: &'a VersionCache,
        image: &'a str,
        executable: &'a str,
    ) -> Self {
        Self {
            runtime,
            cache,
            image,
            executable,
        }
    }

    /// Resolve `requested`; never fails, falling back to `latest`
    pub async fn resolve(&self, requested: &str) -> ResolvedVersion {
        if requested != LATEST {
            return ResolvedVersion::exact(requested);
        }

        if let Some(cached) = self.cache.lookup(requested, Utc::now()) {
            debug!(
                "Using cached version resolution: {} -> {}",
                cached.version, cached.resolved_version
            );
            return cached;
        }

        match self.discover_latest().await {
            Ok(resolved) => {
                debug!(
                    "Resolved latest to {} (tag {})",
                    resolved.version, resolved.resolved_version
                );
                self.cache.store(requested, &resolved, Utc::now());
                resolved
            }
            Err(e) => {
                warn!("Version resolution failed, using latest: {}", e);
                self.cache.clear();
                ResolvedVersion::latest()
            }
        }
    }

    async fn discover_latest(&self) -> VigilResult<ResolvedVersion> {
        let args = vec![
            "--entrypoint".to_string(),
            self.executable.to_string(),
            format!("{}:{}", self.image, LATEST),
            "--version".to_string(),
        ];
        let output = self
            .runtime
            .run_capture(&args)
            .await
            .map_err(|e| VigilError::VersionResolution(e.to_string()))?;
        let version = parse_version_output(&output)?;

        let tagged = format!("{}:{}", self.image, version);
        let exists = self
            .runtime
            .manifest_exists(&tagged)
            .await
            .map_err(|e| VigilError::VersionResolution(e.to_string()))?;

        Ok(ResolvedVersion {
            resolved_version: if exists {
                version.clone()
            } else {
                LATEST.to_string()
            },
            version,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Container runtime double recording calls
    #[derive(Default)]
    pub(crate) struct FakeRuntime {
        pub version_output: Option<String>,
        pub tagged_exists: bool,
        pub failing_pulls: Vec<String>,
        pub run_calls: AtomicUsize,
        pub pulls: Mutex<Vec<String>>,
        pub kills: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn is_available(&self) -> bool {
            true
        }

        async fn pull(&self, image: &str) -> VigilResult<()> {
            self.pulls.lock().unwrap().push(image.to_string());
            if self.failing_pulls.iter().any(|i| i == image) {
                return Err(VigilError::ImagePull {
                    image: image.to_string(),
                    reason: "manifest unknown".to_string(),
                });
            }
            Ok(())
        }

        async fn manifest_exists(&self, _image: &str) -> VigilResult<bool> {
            Ok(self.tagged_exists)
        }

        async fn run_capture(&self, _args: &[String]) -> VigilResult<String> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            self.version_output
                .clone()
                .ok_or_else(|| VigilError::command_exec("docker run", "network unreachable"))
        }

        async fn kill(&self, name: &str) -> VigilResult<()> {
            self.kills.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn binary(&self) -> &str {
            "docker"
        }

        fn runtime_name(&self) -> &'static str {
            "Fake"
        }
    }

    fn runtime_with_version(version: &str, tagged_exists: bool) -> FakeRuntime {
        FakeRuntime {
            version_output: Some(format!("{}\n", version)),
            tagged_exists,
            ..FakeRuntime::default()
        }
    }

    #[test]
    fn validate_versions() {
        assert!(validate_requested_version("latest").is_ok());
        assert!(validate_requested_version("3.2.1").is_ok());
        assert!(matches!(
            validate_requested_version("three"),
            Err(VigilError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn parse_version_output_takes_last_line() {
        let out = "WARNING: platform mismatch\n3.2.255\n";
        assert_eq!(parse_version_output(out).unwrap(), "3.2.255");
        assert_eq!(parse_version_output("checkov v2.5.0").unwrap(), "2.5.0");
        assert!(parse_version_output("\n\n").is_err());
        assert!(parse_version_output("oops").is_err());
    }

    #[tokio::test]
    async fn concrete_version_skips_runtime() {
        let runtime = FakeRuntime::default();
        let cache = VersionCache::new();
        let resolver = VersionResolver::new(&runtime, &cache, "bridgecrew/checkov", "checkov");

        let resolved = resolver.resolve("1.2.3").await;

        assert_eq!(resolved, ResolvedVersion::exact("1.2.3"));
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 0);
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn latest_resolves_to_tagged_version() {
        let runtime = runtime_with_version("3.2.1", true);
        let cache = VersionCache::new();
        let resolver = VersionResolver::new(&runtime, &cache, "bridgecrew/checkov", "checkov");

        let resolved = resolver.resolve(LATEST).await;

        assert_eq!(resolved, ResolvedVersion::exact("3.2.1"));
    }

    #[tokio::test]
    async fn latest_without_tagged_image_keeps_latest_tag() {
        let runtime = runtime_with_version("3.2.1", false);
        let cache = VersionCache::new();
        let resolver = VersionResolver::new(&runtime, &cache, "bridgecrew/checkov", "checkov");

        let resolved = resolver.resolve(LATEST).await;

        assert_eq!(resolved.version, "3.2.1");
        assert_eq!(resolved.resolved_version, LATEST);
    }

    #[tokio::test]
    async fn latest_twice_resolves_once() {
        let runtime = runtime_with_version("3.2.1", true);
        let cache = VersionCache::new();
        let resolver = VersionResolver::new(&runtime, &cache, "bridgecrew/checkov", "checkov");

        let first = resolver.resolve(LATEST).await;
        let second = resolver.resolve(LATEST).await;

        assert_eq!(first, second);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_resolution_falls_back_to_latest() {
        let runtime = FakeRuntime::default();
        let cache = VersionCache::new();
        let resolver = VersionResolver::new(&runtime, &cache, "bridgecrew/checkov", "checkov");

        let resolved = resolver.resolve(LATEST).await;

        assert_eq!(resolved, ResolvedVersion::latest());
        assert!(cache.snapshot().is_none());
    }

    #[test]
    fn cache_entry_expires_after_an_hour() {
        let cache = VersionCache::new();
        let then = Utc::now() - Duration::minutes(61);
        cache.store(LATEST, &ResolvedVersion::exact("3.0.0"), then);

        assert!(cache.lookup(LATEST, then + Duration::minutes(59)).is_some());
        assert!(cache.lookup(LATEST, Utc::now()).is_none());
    }

    #[test]
    fn cache_clear_is_unconditional() {
        let cache = VersionCache::with_entry(Some(VersionCacheEntry {
            requested_version: LATEST.to_string(),
            resolved_version: "3.0.0".to_string(),
            display_version: "3.0.0".to_string(),
            timestamp: Utc::now(),
        }));
        cache.clear();
        assert!(cache.snapshot().is_none());
    }
}
