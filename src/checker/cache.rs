// src/checker/cache.rs
// =============================================================================
// URL-result cache with coalescing access.
//
// The same external target is typically referenced from many pages, so the
// checker memoizes probe results by normalized URL. The map holds one
// tokio OnceCell per URL: the first worker to ask runs the probe, and any
// worker asking while it is in flight awaits that same result instead of
// issuing a duplicate request. The outer lock is only held long enough to
// clone the cell, never across network I/O, so workers do not block each
// other.
//
// Optionally the cache persists across runs as a JSON file. Only Ok
// outcomes are written: a URL that was broken last run must be re-verified,
// while a known-good URL can be trusted without another probe.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use super::http::ProbeOutcome;

#[derive(Default)]
pub struct UrlCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<ProbeOutcome>>>>,
}

// On-disk form: url -> status + timestamp of the run that verified it.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskCache {
    checked: HashMap<String, DiskEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    http_status: Option<u16>,
    checked_at: DateTime<Utc>,
}

impl UrlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached outcome for `url`, running `probe` if there is
    /// none. Concurrent callers for the same URL coalesce onto a single
    /// in-flight probe.
    pub async fn get_or_probe<F, Fut>(&self, url: &str, probe: F) -> ProbeOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProbeOutcome>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells.entry(url.to_string()).or_default().clone()
        };

        cell.get_or_init(probe).await.clone()
    }

    /// Loads a persisted cache file, seeding known-good URLs. A missing
    /// file is an empty cache; an unreadable one is a config error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read URL cache {}", path.display()))?;
        let disk: DiskCache = serde_json::from_str(&text)
            .with_context(|| format!("invalid URL cache {}", path.display()))?;

        let mut cells = HashMap::new();
        for (url, entry) in disk.checked {
            let outcome = ProbeOutcome {
                ok: true,
                http_status: entry.http_status,
                attempts: 0,
                detail: Some(format!(
                    "verified {} by a previous run",
                    entry.checked_at.format("%Y-%m-%d")
                )),
            };
            cells.insert(url, Arc::new(OnceCell::new_with(Some(outcome))));
        }

        Ok(UrlCache {
            cells: Mutex::new(cells),
        })
    }

    /// Writes every Ok outcome back to the cache file.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let mut disk = DiskCache::default();
        let now = Utc::now();

        let cells = self.cells.lock().await;
        for (url, cell) in cells.iter() {
            if let Some(outcome) = cell.get() {
                if outcome.ok {
                    disk.checked.insert(
                        url.clone(),
                        DiskEntry {
                            http_status: outcome.http_status,
                            checked_at: now,
                        },
                    );
                }
            }
        }
        drop(cells);

        let text = serde_json::to_string_pretty(&disk)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write URL cache {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn outcome(ok: bool) -> ProbeOutcome {
        ProbeOutcome {
            ok,
            http_status: Some(if ok { 200 } else { 404 }),
            attempts: 1,
            detail: None,
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_the_cache() {
        let cache = UrlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache
                .get_or_probe("https://example.net/", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    outcome(true)
                })
                .await;
            assert!(result.ok);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_coalesce_to_one_probe() {
        let cache = Arc::new(UrlCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        // The probe yields while "in flight" so both requesters overlap
        let probe = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            outcome(true)
        };

        let (a, b) = tokio::join!(
            cache.get_or_probe("https://example.net/", || probe(calls.clone())),
            cache.get_or_probe("https://example.net/", || probe(calls.clone())),
        );

        assert!(a.ok && b.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_urls_probe_separately() {
        let cache = UrlCache::new();
        let calls = AtomicUsize::new(0);

        for url in ["https://a.example/", "https://b.example/"] {
            cache
                .get_or_probe(url, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    outcome(true)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persist_keeps_only_ok_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = UrlCache::new();
        cache
            .get_or_probe("https://good.example/", || async { outcome(true) })
            .await;
        cache
            .get_or_probe("https://bad.example/", || async { outcome(false) })
            .await;
        cache.persist(&path).await.unwrap();

        let reloaded = UrlCache::load(&path).unwrap();
        let calls = AtomicUsize::new(0);

        // Known-good URL answered from disk, broken one re-probed
        let good = reloaded
            .get_or_probe("https://good.example/", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                outcome(true)
            })
            .await;
        assert!(good.ok);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        reloaded
            .get_or_probe("https://bad.example/", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                outcome(false)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_cache_file_is_empty_cache() {
        let cache = UrlCache::load(Path::new("/nonexistent/cache.json")).unwrap();
        let calls = AtomicUsize::new(0);
        cache
            .get_or_probe("https://example.net/", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                outcome(true)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
