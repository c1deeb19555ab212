// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API: the CLI structure is described with Rust structs
// and enums, and clap generates the parsing code from the attributes.
//
// Subcommands mirror how CI invokes the pipeline:
// - check:    full pipeline (timeline validation + link checking)
// - timeline: timeline dataset validation only (can run before rendering)
// - links:    link extraction + checking only
//
// Most tuning flags are Option<T> here even when they have documented
// defaults: a None means "not given on the command line", which lets the
// per-repo config file fill the value in before the built-in default applies
// (see config::Settings::resolve).
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// This struct represents our entire CLI application
#[derive(Parser, Debug)]
#[command(
    name = "site-guardian",
    version = "0.1.0",
    about = "Validate timeline data and check for broken links in a rendered static site",
    long_about = "site-guardian runs during CI builds of static documentation sites. It validates \
                  the chronological timeline dataset against the rendered content pages and checks \
                  internal and external hyperlinks for reachability. Exit codes: 0 = clean, \
                  1 = content defects found, 2 = load/config failure."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

// Checker tuning flags shared by the `check` and `links` subcommands.
//
// #[command(flatten)] in the subcommand variants splices these in, so the
// two commands stay in sync without repeating every flag.
#[derive(Args, Debug, Clone)]
pub struct CheckerArgs {
    /// Number of concurrent link probes (default: 10)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds (default: 30)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries per URL after the first attempt (default: 2)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Overall deadline for the whole link check in seconds, 0 disables (default: 300)
    ///
    /// When the deadline expires, in-flight probes are abandoned and their
    /// records reported as broken with a timeout note, so CI never hangs on
    /// a slow remote host.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Skip URLs matching this glob or regex pattern (repeatable)
    ///
    /// Some external sites reliably reject automated probes; excluding them
    /// here avoids permanent false positives.
    #[arg(long = "skip", value_name = "PATTERN")]
    pub skip: Vec<String>,

    /// Number of broken external links tolerated before failing (default: 0)
    #[arg(long)]
    pub broken_threshold: Option<usize>,

    /// Public base URL of the site; absolute links under this host are
    /// resolved against the local output tree instead of probed
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to a JSON cache of known-good URLs, reused across runs
    #[arg(long)]
    pub cache_file: Option<PathBuf>,
}

// This enum defines our subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: timeline validation plus link checking
    ///
    /// Example: site-guardian check public/ --timeline data/timeline.yaml
    Check {
        /// Root directory of the rendered site output (e.g. public/)
        site_root: PathBuf,

        /// Path to the timeline dataset file
        #[arg(long, default_value = "data/timeline.yaml")]
        timeline: PathBuf,

        /// Per-repository config file with defaults for these flags
        #[arg(long, default_value = "guardian.yaml")]
        config: PathBuf,

        /// Slug prefix of content pages that timeline entries should reference
        #[arg(long)]
        timeline_pages: Option<String>,

        #[command(flatten)]
        checker: CheckerArgs,

        /// Output the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate the timeline dataset only
    ///
    /// Example: site-guardian timeline data/timeline.yaml --site-root public/
    Timeline {
        /// Path to the timeline dataset file
        dataset: PathBuf,

        /// Rendered site root for cross-reference checks; when omitted,
        /// only the schema and ordering checks run
        #[arg(long)]
        site_root: Option<PathBuf>,

        /// Slug prefix of content pages that timeline entries should reference
        #[arg(long)]
        timeline_pages: Option<String>,

        /// Per-repository config file
        #[arg(long, default_value = "guardian.yaml")]
        config: PathBuf,

        /// Output the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract and check links only, skipping timeline validation
    ///
    /// Example: site-guardian links public/ --skip 'https://flaky.example/*'
    Links {
        /// Root directory of the rendered site output
        site_root: PathBuf,

        /// Per-repository config file
        #[arg(long, default_value = "guardian.yaml")]
        config: PathBuf,

        #[command(flatten)]
        checker: CheckerArgs,

        /// Output the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
