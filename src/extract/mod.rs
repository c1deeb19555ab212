// src/extract/mod.rs
// =============================================================================
// Link Extractor: turns loaded content pages into a deduplicated set of
// LinkRecords ready for checking.
//
// Submodules:
// - html:     extracts hrefs from rendered HTML (scraper)
// - markdown: extracts link destinations from markdown files (pulldown-cmark)
//
// Classification rules:
// - mailto:/tel:/javascript:/data:/file: and other non-HTTP schemes are
//   Skipped and never probed
// - absolute http(s) URLs are External, unless their host matches the
//   configured site base URL, in which case they map back to a local path
// - everything else resolves relative to the page's own path and is
//   Internal; internal targets are settled right here against the loaded
//   file set, so only External records ever reach the network
//
// Identity of a record is (source page, normalized URL): the same target
// linked twice from one page yields one record, linked from two pages
// yields two records (the checker still probes it once, see checker::cache).
// =============================================================================

mod html;
mod markdown;

use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use url::Url;

use crate::loader::{ContentPage, PageKind, SiteTree};

// A raw hyperlink as found in a page, before classification.
#[derive(Debug, Clone)]
pub struct RawLink {
    pub href: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Ok,
    Broken,
    Skipped,
}

// One hyperlink occurrence. Created Pending (or already settled for
// internal/skipped links); mutated exclusively by the Link Checker.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRecord {
    /// Page the link was found on, relative to the site root
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// The href exactly as written in the page
    pub raw: String,
    /// Normalized form: absolute URL for external links, site-relative
    /// path for internal ones; fragments stripped either way
    pub url: String,
    pub kind: LinkKind,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LinkRecord {
    fn new(page: &ContentPage, link: &RawLink, url: String, kind: LinkKind) -> Self {
        LinkRecord {
            source: page.path.clone(),
            line: link.line,
            raw: link.href.clone(),
            url,
            kind,
            status: LinkStatus::Pending,
            http_status: None,
            attempts: 0,
            detail: None,
        }
    }

    fn settled(mut self, status: LinkStatus, detail: Option<&str>) -> Self {
        self.status = status;
        self.detail = detail.map(str::to_string);
        self
    }
}

/// Extracts every hyperlink from the loaded site into LinkRecords.
///
/// Internal records come back already marked Ok/Broken; Skipped records are
/// final; only External records are left Pending for the checker.
pub fn extract_links(site: &SiteTree, base_url: Option<&Url>) -> Vec<LinkRecord> {
    let mut records = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for page in &site.pages {
        let raw_links = match page.kind {
            PageKind::Html => html::extract_hrefs(&page.content),
            PageKind::Markdown => markdown::extract_hrefs(&page.content),
        };

        for link in raw_links {
            let Some(record) = classify(page, &link, site, base_url) else {
                continue;
            };

            // Dedup on (source page, normalized target)
            let key = (
                record.source.to_string_lossy().into_owned(),
                record.url.clone(),
            );
            if seen.insert(key) {
                records.push(record);
            }
        }
    }

    records
}

// Classifies one raw href into a record, or None for hrefs that are not
// links at all (empty, fragment-only).
fn classify(
    page: &ContentPage,
    link: &RawLink,
    site: &SiteTree,
    base_url: Option<&Url>,
) -> Option<LinkRecord> {
    let href = link.href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    // Protocol-relative links inherit https for checking purposes
    let candidate = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    match Url::parse(&candidate) {
        Ok(mut url) => {
            let scheme = url.scheme().to_string();
            if scheme != "http" && scheme != "https" {
                // mailto:, tel:, javascript:, data:, file:, ftp:, ...
                return Some(
                    LinkRecord::new(page, link, candidate.clone(), LinkKind::External).settled(
                        LinkStatus::Skipped,
                        Some(&format!("{}: links are not checked", scheme)),
                    ),
                );
            }

            url.set_fragment(None);

            // Absolute links pointing at our own host are really internal
            // and resolve against the local tree
            if let Some(base) = base_url {
                if url.host_str() == base.host_str() {
                    let path = url.path().trim_start_matches('/').to_string();
                    return Some(settle_internal(page, link, path, site));
                }
            }

            Some(LinkRecord::new(
                page,
                link,
                url.to_string(),
                LinkKind::External,
            ))
        }
        // Not an absolute URL: resolve against the page's own path
        Err(_) => {
            let path = resolve_site_path(page, href)?;
            Some(settle_internal(page, link, path, site))
        }
    }
}

// Builds an internal record and resolves it immediately: no network is
// needed to know whether a local target exists.
fn settle_internal(
    page: &ContentPage,
    link: &RawLink,
    path: String,
    site: &SiteTree,
) -> LinkRecord {
    let record = LinkRecord::new(page, link, path.clone(), LinkKind::Internal);

    if internal_target_exists(site, &path) {
        record.settled(LinkStatus::Ok, None)
    } else {
        record.settled(
            LinkStatus::Broken,
            Some("target not found in rendered output"),
        )
    }
}

// Resolves a relative or root-relative href against the page's path,
// returning a normalized site path with the fragment and query dropped.
//
// We piggyback on the url crate's join semantics (the same resolution a
// browser performs) by mounting the site at a synthetic origin.
fn resolve_site_path(page: &ContentPage, href: &str) -> Option<String> {
    let origin = Url::parse("https://site.invalid/").expect("static origin parses");
    let page_url = origin.join(&page.path.to_string_lossy()).ok()?;
    let mut target = page_url.join(href).ok()?;

    target.set_fragment(None);

    // join() can only leave the synthetic origin if the href was absolute,
    // which classify() already handled
    if target.host_str() != Some("site.invalid") {
        return None;
    }

    Some(target.path().trim_start_matches('/').to_string())
}

// A normalized site path matches the rendered tree if the exact file
// exists, or if it names a directory-style URL whose index.html does, or
// if the renderer emitted it as a flat .html file.
fn internal_target_exists(site: &SiteTree, path: &str) -> bool {
    if path.is_empty() {
        return site.has_file("index.html");
    }

    if let Some(dir) = path.strip_suffix('/') {
        return site.has_file(&format!("{}index.html", path))
            || site.has_file(&format!("{}.html", dir));
    }

    site.has_file(path)
        || site.has_file(&format!("{}/index.html", path))
        || site.has_file(&format!("{}.html", path))
}
