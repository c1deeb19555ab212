// src/main.rs
// =============================================================================
// This is the entry point of the content-integrity pipeline.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Load the per-repo config and merge it under the CLI flags
// 3. Dispatch to the subcommand handler, which runs the pipeline stages:
//    loader -> {timeline validator, link extractor -> link checker} -> report
// 4. Print the report and exit with the right code
//
// Exit codes:
//   0 = no error-severity findings and broken links within threshold
//   1 = content defects (timeline errors or too many broken links)
//   2 = the pipeline itself could not run (missing inputs, bad config)
// =============================================================================

mod checker;
mod cli;
mod config;
mod extract;
mod loader;
mod report;
mod timeline;

use anyhow::Result;
use clap::Parser;
use std::path::Path;

use checker::{CheckerConfig, UrlCache};
use cli::{CheckerArgs, Cli, Commands};
use config::{GuardianConfig, Settings};
use extract::{LinkRecord, LinkStatus};
use loader::SiteTree;
use report::ValidationIssue;

#[tokio::main]
async fn main() {
    // Run the pipeline and capture the exit code; anything that escapes as
    // an error is a pipeline failure, not a content defect
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            site_root,
            timeline,
            config,
            timeline_pages,
            checker,
            json,
        } => handle_check(&site_root, &timeline, &config, timeline_pages, checker, json).await,
        Commands::Timeline {
            dataset,
            site_root,
            timeline_pages,
            config,
            json,
        } => handle_timeline(&dataset, site_root.as_deref(), timeline_pages, &config, json),
        Commands::Links {
            site_root,
            config,
            checker,
            json,
        } => handle_links(&site_root, &config, checker, json).await,
    }
}

// Handles the 'check' subcommand: the full pipeline.
async fn handle_check(
    site_root: &Path,
    timeline_path: &Path,
    config_path: &Path,
    timeline_pages: Option<String>,
    args: CheckerArgs,
    json: bool,
) -> Result<i32> {
    let config = GuardianConfig::load(config_path)?;
    let settings = Settings::resolve(&args, &config)?;
    let prefix = Settings::timeline_pages_prefix(timeline_pages.as_deref(), &config);

    if !json {
        println!("🔍 Validating rendered site: {}", site_root.display());
    }

    let site = loader::load_site(site_root)?;
    let dataset = loader::load_timeline(timeline_path)?;

    if !json {
        println!(
            "📄 Loaded {} page(s) and {} timeline entr{}",
            site.pages.len(),
            dataset.entries.len(),
            if dataset.entries.len() == 1 { "y" } else { "ies" }
        );
    }

    let issues = timeline::validate(&dataset, Some(&site), &prefix);
    let records = resolve_links(&site, &settings, json).await?;

    finish(issues, records, settings.broken_threshold, json)
}

// Handles the 'timeline' subcommand: dataset checks only.
fn handle_timeline(
    dataset_path: &Path,
    site_root: Option<&Path>,
    timeline_pages: Option<String>,
    config_path: &Path,
    json: bool,
) -> Result<i32> {
    let config = GuardianConfig::load(config_path)?;
    let prefix = Settings::timeline_pages_prefix(timeline_pages.as_deref(), &config);

    if !json {
        println!("🔍 Validating timeline: {}", dataset_path.display());
    }

    let dataset = loader::load_timeline(dataset_path)?;

    // Without a rendered tree the cross-reference checks have nothing to
    // resolve against and are skipped
    let site = match site_root {
        Some(root) => Some(loader::load_site(root)?),
        None => None,
    };

    let issues = timeline::validate(&dataset, site.as_ref(), &prefix);
    finish(issues, Vec::new(), 0, json)
}

// Handles the 'links' subcommand: link extraction + checking only.
async fn handle_links(
    site_root: &Path,
    config_path: &Path,
    args: CheckerArgs,
    json: bool,
) -> Result<i32> {
    let config = GuardianConfig::load(config_path)?;
    let settings = Settings::resolve(&args, &config)?;

    if !json {
        println!("🔍 Checking links in rendered site: {}", site_root.display());
    }

    let site = loader::load_site(site_root)?;
    let records = resolve_links(&site, &settings, json).await?;

    finish(Vec::new(), records, settings.broken_threshold, json)
}

// Extracts links from the loaded site and resolves the external ones over
// the network, reusing the persisted URL cache when one is configured.
async fn resolve_links(
    site: &SiteTree,
    settings: &Settings,
    json: bool,
) -> Result<Vec<LinkRecord>> {
    let records = extract::extract_links(site, settings.base_url.as_ref());
    let pending = records
        .iter()
        .filter(|r| r.status == LinkStatus::Pending)
        .count();

    if !json {
        println!(
            "🔗 Found {} link(s), {} external to check",
            records.len(),
            pending
        );
        if pending > 0 {
            println!(
                "🌐 Checking with {} concurrent worker(s)...",
                settings.concurrency
            );
        }
    }

    let checker_config = CheckerConfig::from_settings(settings)?;
    let cache = match &settings.cache_file {
        Some(path) => UrlCache::load(path)?,
        None => UrlCache::new(),
    };

    let records = checker::check_links(records, &checker_config, &cache).await;

    if let Some(path) = &settings.cache_file {
        cache.persist(path).await?;
    }

    Ok(records)
}

// Assembles and prints the report, returning the verdict as the exit code.
fn finish(
    issues: Vec<ValidationIssue>,
    records: Vec<LinkRecord>,
    broken_threshold: usize,
    json: bool,
) -> Result<i32> {
    let report = report::assemble(issues, &records, broken_threshold);
    report::print_report(&report, json)?;
    Ok(report.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn empty_args() -> CheckerArgs {
        CheckerArgs {
            concurrency: None,
            timeout: None,
            retries: None,
            deadline: None,
            skip: vec![],
            broken_threshold: None,
            base_url: None,
            cache_file: None,
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    // A small self-consistent site: one timeline page, referenced by the
    // dataset, linked internally, no external links.
    fn fixture(root: &Path) -> (PathBuf, PathBuf) {
        let site = root.join("public");
        write(
            &site,
            "index.html",
            r#"<a href="/timeline/metropolitan-railway/">1863</a>"#,
        );
        write(&site, "timeline/metropolitan-railway/index.html", "<html></html>");

        let dataset = root.join("timeline.yaml");
        fs::write(
            &dataset,
            "order: ascending\nentries:\n- date: 1863-01-10\n  title: Metropolitan Railway opens\n  page: timeline/metropolitan-railway\n",
        )
        .unwrap();

        (site, dataset)
    }

    #[tokio::test]
    async fn test_check_clean_site_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (site, dataset) = fixture(dir.path());

        let code = handle_check(
            &site,
            &dataset,
            &dir.path().join("guardian.yaml"),
            None,
            empty_args(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_check_broken_internal_link_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let (site, dataset) = fixture(dir.path());
        write(&site, "guide/index.html", r#"<a href="/missing/">gone</a>"#);

        let code = handle_check(
            &site,
            &dataset,
            &dir.path().join("guardian.yaml"),
            None,
            empty_args(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_check_missing_site_root_is_pipeline_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, dataset) = fixture(dir.path());

        let result = handle_check(
            &dir.path().join("never-rendered"),
            &dataset,
            &dir.path().join("guardian.yaml"),
            None,
            empty_args(),
            true,
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_timeline_only_run_without_site() {
        let dir = tempfile::tempdir().unwrap();
        let (_, dataset) = fixture(dir.path());

        let code = handle_timeline(
            &dataset,
            None,
            None,
            &dir.path().join("guardian.yaml"),
            true,
        )
        .unwrap();

        assert_eq!(code, 0);
    }

    #[test]
    fn test_timeline_defect_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("timeline.yaml");
        fs::write(
            &dataset,
            "entries:\n- title: No date here\n",
        )
        .unwrap();

        let code = handle_timeline(
            &dataset,
            None,
            None,
            &dir.path().join("guardian.yaml"),
            true,
        )
        .unwrap();

        assert_eq!(code, 1);
    }
}
