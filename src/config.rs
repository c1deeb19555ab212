// src/config.rs
// =============================================================================
// Per-repository configuration.
//
// Every site repository that invokes the pipeline can carry a guardian.yaml
// next to its content, overriding checker thresholds and exclude patterns
// without touching this tool. Precedence, highest first:
//
//   1. Command-line flag
//   2. Config file value
//   3. Built-in default
//
// The CLI keeps its tuning flags as Option<T> so that "flag not given" is
// distinguishable from "flag given with the default value" (see cli.rs).
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cli::CheckerArgs;

// Built-in defaults, documented in the CLI help text.
const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_DEADLINE_SECS: u64 = 300;
const DEFAULT_BACKOFF_MS: u64 = 500;
const DEFAULT_BROKEN_THRESHOLD: usize = 0;
const DEFAULT_TIMELINE_PAGES: &str = "timeline";

// The shape of guardian.yaml. All fields optional: an empty file is valid.
//
// #[serde(deny_unknown_fields)] rejects typos like `concurency:` at load
// time instead of silently ignoring them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GuardianConfig {
    /// Glob or regex patterns for URLs the checker must never probe
    pub skip_patterns: Vec<String>,
    pub broken_threshold: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub deadline_secs: Option<u64>,
    pub backoff_ms: Option<u64>,
    pub base_url: Option<String>,
    pub timeline_pages: Option<String>,
    pub cache_file: Option<PathBuf>,
}

impl GuardianConfig {
    // Loads the config file if it exists.
    //
    // A missing file is not an error (most repos run on defaults); a file
    // that exists but does not parse is a config failure and aborts the run
    // before any checks (exit code 2).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

// Fully-resolved settings handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: u32,
    /// Base delay for exponential backoff between retry attempts
    pub backoff: Duration,
    /// Overall deadline for the link-check phase; None disables it
    pub deadline: Option<Duration>,
    pub skip_patterns: Vec<String>,
    pub broken_threshold: usize,
    pub base_url: Option<Url>,
    pub timeline_pages: String,
    pub cache_file: Option<PathBuf>,
}

impl Settings {
    // Merges CLI flags over the config file over built-in defaults.
    pub fn resolve(args: &CheckerArgs, config: &GuardianConfig) -> Result<Self> {
        // Skip patterns accumulate rather than override: the config file
        // carries the repo's standing exclusions, the CLI adds one-off ones.
        let mut skip_patterns = config.skip_patterns.clone();
        skip_patterns.extend(args.skip.iter().cloned());

        let deadline_secs = args
            .deadline
            .or(config.deadline_secs)
            .unwrap_or(DEFAULT_DEADLINE_SECS);

        // The base URL must parse up front; a typo here would silently turn
        // every internal link into an external probe.
        let base_url = match args.base_url.as_ref().or(config.base_url.as_ref()) {
            Some(raw) => Some(
                Url::parse(raw).with_context(|| format!("invalid base URL '{}'", raw))?,
            ),
            None => None,
        };

        Ok(Settings {
            concurrency: args
                .concurrency
                .or(config.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            timeout: Duration::from_secs(
                args.timeout
                    .or(config.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            retries: args.retries.or(config.retries).unwrap_or(DEFAULT_RETRIES),
            backoff: Duration::from_millis(config.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS)),
            deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            skip_patterns,
            broken_threshold: args
                .broken_threshold
                .or(config.broken_threshold)
                .unwrap_or(DEFAULT_BROKEN_THRESHOLD),
            base_url,
            timeline_pages: config
                .timeline_pages
                .clone()
                .unwrap_or_else(|| DEFAULT_TIMELINE_PAGES.to_string()),
            cache_file: args.cache_file.clone().or_else(|| config.cache_file.clone()),
        })
    }

    // Resolves the timeline-pages prefix for subcommands that take it as a
    // flag of their own rather than through CheckerArgs.
    pub fn timeline_pages_prefix(cli_value: Option<&str>, config: &GuardianConfig) -> String {
        cli_value
            .map(str::to_string)
            .or_else(|| config.timeline_pages.clone())
            .unwrap_or_else(|| DEFAULT_TIMELINE_PAGES.to_string())
    }
}
