// src/timeline/mod.rs
// =============================================================================
// Timeline Validator: checks the timeline dataset's internal schema and its
// cross-references against the loaded content pages.
//
// The dataset is YAML, either the full form:
//
//   order: descending          # ascending | descending | unordered
//   entries:
//     - date: 2003-02-17
//       title: Congestion charge introduced
//       body: ...
//       page: timeline/congestion-charge   # optional cross-reference slug
//
// or a legacy bare list of entries (order then defaults to descending, the
// direction the platform renders timelines in).
//
// Entries are deserialized as raw YAML values and validated here one at a
// time: a malformed entry produces a schema error for that entry and never
// stops the remaining entries from being checked. Schema errors block
// publication; a page that exists but is not yet referenced only warns, so
// editors can land timeline-adjacent pages before backfilling entries.
// =============================================================================

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::loader::SiteTree;
use crate::report::{IssueCategory, ValidationIssue};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Declared ordering of the dataset. Uniqueness of dates is enforced
/// regardless; direction only matters for the ordering check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetOrder {
    Ascending,
    #[default]
    Descending,
    Unordered,
}

// The dataset as loaded from disk. Entries stay as raw YAML values so that
// one bad entry cannot abort the load (see loader::load_timeline).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineDataset {
    #[serde(default)]
    pub order: DatasetOrder,
    #[serde(default)]
    pub entries: Vec<serde_yaml::Value>,
    #[serde(skip)]
    pub source: PathBuf,
}

// A single entry after per-entry schema validation. Fields are optional
// because validation keeps going past missing ones; the schema issues have
// already been recorded by the time this struct exists.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    /// 1-based position in the dataset, used in issue messages
    pub index: usize,
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
    pub page: Option<String>,
}

impl TimelineEntry {
    // How the entry is named in messages: by title when it has one.
    fn label(&self) -> String {
        match &self.title {
            Some(title) => format!("'{}'", title),
            None => format!("entry {}", self.index),
        }
    }
}

/// Runs every timeline check and returns the accumulated issues.
///
/// `site` is None when validating before rendering; cross-reference checks
/// are skipped in that case. `pages_prefix` names the content section whose
/// pages are expected to be referenced by timeline entries.
pub fn validate(
    dataset: &TimelineDataset,
    site: Option<&SiteTree>,
    pages_prefix: &str,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let file = dataset.source.to_string_lossy().into_owned();

    if dataset.entries.is_empty() {
        issues.push(ValidationIssue::error(
            IssueCategory::TimelineSchema,
            "timeline dataset contains no entries",
            &file,
            None,
        ));
        return issues;
    }

    let entries: Vec<TimelineEntry> = dataset
        .entries
        .iter()
        .enumerate()
        .map(|(i, value)| check_entry_schema(i + 1, value, &file, &mut issues))
        .collect();

    check_unique_dates(&entries, &file, &mut issues);
    if dataset.order != DatasetOrder::Unordered {
        check_ordering(&entries, dataset.order, &file, &mut issues);
    }

    if let Some(site) = site {
        check_cross_references(&entries, site, pages_prefix, &file, &mut issues);
    }

    issues
}

// Schema check for one entry. Every defect becomes its own issue; the
// entry is still returned (with what could be salvaged) so later checks
// can run over the rest of it.
fn check_entry_schema(
    index: usize,
    value: &serde_yaml::Value,
    file: &str,
    issues: &mut Vec<ValidationIssue>,
) -> TimelineEntry {
    let mut entry = TimelineEntry {
        index,
        date: None,
        title: None,
        page: None,
    };
    let mut error = |message: String| {
        issues.push(ValidationIssue::error(
            IssueCategory::TimelineSchema,
            message,
            file,
            None,
        ));
    };

    let serde_yaml::Value::Mapping(map) = value else {
        error(format!("entry {} is not a key/value mapping", index));
        return entry;
    };

    let mut has_date = false;
    let mut has_title = false;

    for (key, val) in map {
        let Some(key) = key.as_str() else {
            error(format!("entry {} has a non-string key", index));
            continue;
        };

        match key {
            "date" => {
                has_date = true;
                match val.as_str() {
                    Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                        Ok(date) => entry.date = Some(date),
                        Err(_) => error(format!(
                            "entry {}: date '{}' does not parse as YYYY-MM-DD",
                            index, raw
                        )),
                    },
                    None => error(format!(
                        "entry {}: 'date' must be a YYYY-MM-DD string",
                        index
                    )),
                }
            }
            "title" => {
                has_title = true;
                match val.as_str() {
                    Some(raw) if !raw.trim().is_empty() => entry.title = Some(raw.to_string()),
                    Some(_) => error(format!("entry {}: 'title' is empty", index)),
                    None => error(format!("entry {}: 'title' must be a string", index)),
                }
            }
            "body" => {
                if val.as_str().is_none() {
                    error(format!("entry {}: 'body' must be a string", index));
                }
            }
            "page" => match val.as_str() {
                Some(raw) if !raw.trim().is_empty() => entry.page = Some(raw.to_string()),
                _ => error(format!(
                    "entry {}: 'page' must be a non-empty page slug",
                    index
                )),
            },
            unknown => error(format!("entry {} has unknown field '{}'", index, unknown)),
        }
    }

    if !has_date {
        error(format!("entry {} is missing 'date'", index));
    }
    if !has_title {
        error(format!("entry {} is missing 'title'", index));
    }

    entry
}

// Duplicate dates are defects whatever the declared order. One issue per
// duplicate, naming both entries involved.
fn check_unique_dates(entries: &[TimelineEntry], file: &str, issues: &mut Vec<ValidationIssue>) {
    let mut first_seen: HashMap<NaiveDate, usize> = HashMap::new();

    for (pos, entry) in entries.iter().enumerate() {
        let Some(date) = entry.date else { continue };

        match first_seen.get(&date).copied() {
            Some(first_pos) => {
                let original = &entries[first_pos];
                issues.push(ValidationIssue::error(
                    IssueCategory::TimelineSchema,
                    format!(
                        "duplicate date {}: {} (entry {}) and {} (entry {})",
                        date.format(DATE_FORMAT),
                        original.label(),
                        original.index,
                        entry.label(),
                        entry.index
                    ),
                    file,
                    None,
                ));
            }
            None => {
                first_seen.insert(date, pos);
            }
        }
    }
}

// Adjacent entries must follow the declared direction strictly. Entries
// whose dates failed the schema check are skipped; equal dates are already
// reported as duplicates and not repeated here.
fn check_ordering(
    entries: &[TimelineEntry],
    order: DatasetOrder,
    file: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let dated: Vec<&TimelineEntry> = entries.iter().filter(|e| e.date.is_some()).collect();

    for pair in dated.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let (prev_date, next_date) = (prev.date.unwrap(), next.date.unwrap());

        let violated = match order {
            DatasetOrder::Ascending => prev_date > next_date,
            DatasetOrder::Descending => prev_date < next_date,
            DatasetOrder::Unordered => false,
        };

        if violated {
            let direction = match order {
                DatasetOrder::Ascending => "ascending order (oldest first)",
                _ => "descending order (newest first)",
            };
            issues.push(ValidationIssue::error(
                IssueCategory::TimelineSchema,
                format!(
                    "order violation: {} ({}) appears before {} ({}) but the timeline declares {}",
                    prev.label(),
                    prev_date.format(DATE_FORMAT),
                    next.label(),
                    next_date.format(DATE_FORMAT),
                    direction
                ),
                file,
                None,
            ));
        }
    }
}

// Cross-reference checks, both directions:
// - an entry referencing a page that does not exist is an error
// - a page in the timeline section that no entry references is a warning
fn check_cross_references(
    entries: &[TimelineEntry],
    site: &SiteTree,
    pages_prefix: &str,
    file: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let slugs: HashSet<&str> = site.pages.iter().map(|p| p.slug.as_str()).collect();
    let referenced: HashSet<&str> = entries
        .iter()
        .filter_map(|e| e.page.as_deref())
        .collect();

    for entry in entries {
        let Some(page) = entry.page.as_deref() else {
            continue;
        };
        if !slugs.contains(page) {
            issues.push(ValidationIssue::error(
                IssueCategory::TimelineCrossRef,
                format!(
                    "{} (entry {}) references page '{}' which does not exist",
                    entry.label(),
                    entry.index,
                    page
                ),
                file,
                None,
            ));
        }
    }

    let section = format!("{}/", pages_prefix.trim_end_matches('/'));
    for page in &site.pages {
        // Only pages inside the timeline section; its index page is
        // navigation, not an entry target
        if !page.slug.starts_with(&section) {
            continue;
        }
        if !referenced.contains(page.slug.as_str()) {
            issues.push(ValidationIssue::warning(
                IssueCategory::TimelineCrossRef,
                format!(
                    "page '{}' is not referenced by any timeline entry",
                    page.slug
                ),
                page.path.to_string_lossy().into_owned(),
                None,
            ));
        }
    }
}
