// src/checker/mod.rs
// =============================================================================
// Link Checker: resolves every pending external LinkRecord over the network.
//
// Submodules:
// - http:  the per-URL probe protocol (HEAD/GET, retries, backoff)
// - cache: coalescing memoization of probe results by normalized URL
//
// Scheduling: a bounded worker pool built from buffer_unordered. Workers
// share one pooled HTTP client and the cache; the cache is the only state
// touched concurrently, and its locking guarantees one in-flight probe per
// URL no matter how many records point at it.
//
// The whole phase runs under an optional deadline. A probe still in flight
// when it expires is abandoned and its record marked broken with a timeout
// note; the run always reaches the report.
// =============================================================================

pub mod cache;
pub mod http;

pub use cache::UrlCache;
pub use http::ProbeOutcome;

use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::config::Settings;
use crate::extract::{LinkRecord, LinkStatus};

// Domains never probed: local and placeholder hosts, plus sites whose bot
// detection answers automated probes with errors and floods CI with false
// positives.
const ALWAYS_SKIP_DOMAINS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "example.com",
    "example.org",
    "github.com",
    "raw.githubusercontent.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
];

// A desktop browser User-Agent. Several hosts serve probes differently (or
// not at all) when the UA looks like a script.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

// Checker configuration with compiled skip patterns.
pub struct CheckerConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub deadline: Option<Duration>,
    skip_patterns: Vec<Regex>,
    /// Probe localhost/private hosts (integration tests run mock servers there)
    allow_localhost: bool,
}

impl CheckerConfig {
    /// Builds a checker config from resolved settings, compiling the skip
    /// patterns. A pattern that compiles as neither glob nor regex is a
    /// config error (exit 2), caught before any checking starts.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let skip_patterns = settings
            .skip_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(CheckerConfig {
            concurrency: settings.concurrency,
            timeout: settings.timeout,
            retries: settings.retries,
            backoff: settings.backoff,
            deadline: settings.deadline,
            skip_patterns,
            allow_localhost: false,
        })
    }

    #[cfg(test)]
    fn for_tests(patterns: &[&str]) -> Self {
        CheckerConfig {
            concurrency: 4,
            timeout: Duration::from_secs(5),
            retries: 0,
            backoff: Duration::from_millis(1),
            deadline: None,
            skip_patterns: patterns.iter().map(|p| compile_pattern(p).unwrap()).collect(),
            allow_localhost: true,
        }
    }
}

// Exclude patterns accept two spellings:
// - plain globs (* and ? only), matched against the whole URL
// - regexes (anything with regex metacharacters), matched anywhere
fn compile_pattern(pattern: &str) -> anyhow::Result<Regex> {
    let looks_like_regex = pattern
        .chars()
        .any(|c| matches!(c, '\\' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '+'));

    let regex = if looks_like_regex {
        Regex::new(pattern)
    } else {
        let escaped = regex::escape(pattern)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");
        Regex::new(&format!("^{}$", escaped))
    };

    regex.map_err(|e| anyhow::anyhow!("invalid skip pattern '{}': {}", pattern, e))
}

/// Resolves every pending external record's status. Settled records
/// (internal, already-skipped) pass through untouched.
///
/// Completion order is whatever the workers produce; callers that need
/// stable output sort later (see report::assemble).
pub async fn check_links(
    records: Vec<LinkRecord>,
    config: &CheckerConfig,
    cache: &UrlCache,
) -> Vec<LinkRecord> {
    // One client for every probe: connection pooling plus uniform policy
    let client = Client::builder()
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client");

    let deadline_at = config.deadline.map(|d| Instant::now() + d);

    let futures = records.into_iter().map(|record| {
        let client = client.clone();
        async move { resolve_record(record, &client, config, cache, deadline_at).await }
    });

    stream::iter(futures)
        .buffer_unordered(config.concurrency)
        .collect()
        .await
}

async fn resolve_record(
    mut record: LinkRecord,
    client: &Client,
    config: &CheckerConfig,
    cache: &UrlCache,
    deadline_at: Option<Instant>,
) -> LinkRecord {
    if record.status != LinkStatus::Pending {
        return record;
    }

    if let Some(reason) = skip_reason(&record.url, config) {
        record.status = LinkStatus::Skipped;
        record.detail = Some(reason);
        return record;
    }

    let probe = || http::probe_with_retries(client, &record.url, config.retries, config.backoff);
    let lookup = cache.get_or_probe(&record.url, probe);

    let outcome = match deadline_at {
        Some(at) => match tokio::time::timeout_at(at, lookup).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome {
                ok: false,
                http_status: None,
                attempts: 0,
                detail: Some("run deadline exceeded before this URL finished checking".to_string()),
            },
        },
        None => lookup.await,
    };

    record.status = if outcome.ok {
        LinkStatus::Ok
    } else {
        LinkStatus::Broken
    };
    record.http_status = outcome.http_status;
    record.attempts = outcome.attempts;
    record.detail = outcome.detail;
    record
}

// Why a URL is excluded from checking, if it is.
fn skip_reason(url: &str, config: &CheckerConfig) -> Option<String> {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            for domain in ALWAYS_SKIP_DOMAINS {
                if config.allow_localhost && matches!(*domain, "localhost" | "127.0.0.1") {
                    continue;
                }
                if host == *domain || host.ends_with(&format!(".{}", domain)) {
                    return Some(format!("domain {} is on the built-in skip list", domain));
                }
            }
        }
    }

    config
        .skip_patterns
        .iter()
        .find(|p| p.is_match(url))
        .map(|p| format!("matches exclude pattern '{}'", p.as_str()))
}
