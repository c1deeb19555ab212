// src/report/mod.rs
// =============================================================================
// Report Aggregator: merges validator issues and resolved link records into
// one Report with a pass/fail verdict.
//
// The verdict rule:
// - any error-severity issue outside the broken-link category fails the run
//   (timeline schema defects always block publication)
// - broken links fail the run only when their count exceeds the configured
//   threshold (default 0: any broken link fails)
// - warnings never fail the run
//
// Issues are sorted by (file, line, message) before output, so the report
// is byte-identical across runs regardless of worker scheduling.
// =============================================================================

use anyhow::Result;
use serde::Serialize;

use crate::extract::{LinkKind, LinkRecord, LinkStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    TimelineSchema,
    TimelineCrossRef,
    BrokenLink,
}

// One finding. Append-only: validators push these, the aggregator consumes
// them exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl ValidationIssue {
    pub fn error(
        category: IssueCategory,
        message: impl Into<String>,
        file: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            category,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    pub fn warning(
        category: IssueCategory,
        message: impl Into<String>,
        file: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            category,
            message: message.into(),
            file: file.into(),
            line,
        }
    }
}

// Link counts by status, plus the internal/external split.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LinkSummary {
    pub total: usize,
    pub ok: usize,
    pub broken: usize,
    pub skipped: usize,
    pub pending: usize,
    pub internal: usize,
    pub external: usize,
}

impl LinkSummary {
    fn tally(records: &[LinkRecord]) -> Self {
        let mut summary = LinkSummary {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.status {
                LinkStatus::Ok => summary.ok += 1,
                LinkStatus::Broken => summary.broken += 1,
                LinkStatus::Skipped => summary.skipped += 1,
                LinkStatus::Pending => summary.pending += 1,
            }
            match record.kind {
                LinkKind::Internal => summary.internal += 1,
                LinkKind::External => summary.external += 1,
            }
        }

        summary
    }
}

// Terminal artifact of a run; serialized as-is for --json consumers.
#[derive(Debug, Serialize)]
pub struct Report {
    pub issues: Vec<ValidationIssue>,
    pub links: LinkSummary,
    pub exit_code: i32,
}

/// Merges validator issues and the final link records into a Report.
pub fn assemble(
    mut issues: Vec<ValidationIssue>,
    records: &[LinkRecord],
    broken_threshold: usize,
) -> Report {
    for record in records {
        if record.status != LinkStatus::Broken {
            continue;
        }

        let reason = match (record.http_status, record.detail.as_deref()) {
            (Some(code), _) => format!("HTTP {}", code),
            (None, Some(detail)) => detail.to_string(),
            (None, None) => "unreachable".to_string(),
        };

        issues.push(ValidationIssue::error(
            IssueCategory::BrokenLink,
            format!("broken link {} ({})", record.url, reason),
            record.source.to_string_lossy().into_owned(),
            record.line,
        ));
    }

    // Deterministic order: by location, then message
    issues.sort_by(|a, b| {
        (&a.file, a.line.unwrap_or(0), &a.message).cmp(&(&b.file, b.line.unwrap_or(0), &b.message))
    });

    let links = LinkSummary::tally(records);

    // Broken links count against the threshold; every other error blocks
    let blocking = issues
        .iter()
        .filter(|i| i.severity == Severity::Error && i.category != IssueCategory::BrokenLink)
        .count();
    let exit_code = if blocking > 0 || links.broken > broken_threshold {
        1
    } else {
        0
    };

    Report {
        issues,
        links,
        exit_code,
    }
}

/// Prints the report either as pretty JSON (for CI) or a table (for humans).
pub fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &Report) {
    if !report.issues.is_empty() {
        println!("{:<12} {:<44} {}", "LEVEL", "LOCATION", "MESSAGE");
        println!("{}", "=".repeat(100));

        for issue in &report.issues {
            let location = match issue.line {
                Some(line) => format!("{}:{}", issue.file, line),
                None => issue.file.clone(),
            };
            // Truncate long locations so the table stays readable
            let location = if location.len() > 41 {
                let mut start = location.len() - 38;
                while !location.is_char_boundary(start) {
                    start += 1;
                }
                format!("...{}", &location[start..])
            } else {
                location
            };

            println!(
                "{:<12} {:<44} {}",
                format_severity(issue.severity),
                location,
                issue.message
            );
        }

        println!();
    }

    let errors = report
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    let warnings = report.issues.len() - errors;

    println!("📊 Summary:");
    println!("   ❌ Errors: {}", errors);
    println!("   ⚠️  Warnings: {}", warnings);
    println!(
        "   🔗 Links: {} ok, {} broken, {} skipped of {} total ({} internal, {} external)",
        report.links.ok,
        report.links.broken,
        report.links.skipped,
        report.links.total,
        report.links.internal,
        report.links.external
    );

    if report.exit_code == 0 {
        println!("   ✅ PASS");
    } else {
        println!("   ❌ FAIL");
    }
}

fn format_severity(severity: Severity) -> String {
    match severity {
        Severity::Error => "❌ error".to_string(),
        Severity::Warning => "⚠️  warn".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(url: &str, status: LinkStatus, http: Option<u16>) -> LinkRecord {
        LinkRecord {
            source: PathBuf::from("guide/index.html"),
            line: Some(4),
            raw: url.to_string(),
            url: url.to_string(),
            kind: LinkKind::External,
            status,
            http_status: http,
            attempts: 1,
            detail: None,
        }
    }

    #[test]
    fn test_clean_run_exits_zero() {
        let report = assemble(vec![], &[record("https://a.example/", LinkStatus::Ok, Some(200))], 0);
        assert_eq!(report.exit_code, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_timeline_error_exits_one() {
        let issues = vec![ValidationIssue::error(
            IssueCategory::TimelineSchema,
            "entry 2 is missing 'date'",
            "data/timeline.yaml",
            None,
        )];
        let report = assemble(issues, &[], 0);
        assert_eq!(report.exit_code, 1);
    }

    #[test]
    fn test_warning_alone_passes() {
        let issues = vec![ValidationIssue::warning(
            IssueCategory::TimelineCrossRef,
            "page 'timeline/trams' is not referenced by any timeline entry",
            "timeline/trams/index.html",
            None,
        )];
        let report = assemble(issues, &[], 0);
        assert_eq!(report.exit_code, 0);
    }

    #[test]
    fn test_broken_link_becomes_issue_and_fails() {
        let records = vec![record("https://gone.example/", LinkStatus::Broken, Some(404))];
        let report = assemble(vec![], &records, 0);

        assert_eq!(report.exit_code, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, IssueCategory::BrokenLink);
        assert!(report.issues[0].message.contains("HTTP 404"));
        assert_eq!(report.links.broken, 1);
    }

    #[test]
    fn test_broken_within_threshold_passes() {
        let records = vec![record("https://gone.example/", LinkStatus::Broken, Some(404))];
        let report = assemble(vec![], &records, 1);

        // Still listed as an issue, but the verdict honors the threshold
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_issues_sorted_by_location() {
        let issues = vec![
            ValidationIssue::error(IssueCategory::TimelineSchema, "zzz", "b.yaml", None),
            ValidationIssue::error(IssueCategory::TimelineSchema, "aaa", "a.yaml", Some(9)),
            ValidationIssue::error(IssueCategory::TimelineSchema, "mmm", "a.yaml", Some(2)),
        ];
        let report = assemble(issues, &[], 0);

        assert_eq!(report.issues[0].file, "a.yaml");
        assert_eq!(report.issues[0].line, Some(2));
        assert_eq!(report.issues[1].line, Some(9));
        assert_eq!(report.issues[2].file, "b.yaml");
    }

    #[test]
    fn test_summary_counts_by_status_and_kind() {
        let mut internal = record("/guide/", LinkStatus::Ok, None);
        internal.kind = LinkKind::Internal;

        let records = vec![
            internal,
            record("https://a.example/", LinkStatus::Ok, Some(200)),
            record("https://b.example/", LinkStatus::Broken, Some(500)),
            record("https://c.example/", LinkStatus::Skipped, None),
        ];
        let report = assemble(vec![], &records, 10);

        assert_eq!(report.links.total, 4);
        assert_eq!(report.links.ok, 2);
        assert_eq!(report.links.broken, 1);
        assert_eq!(report.links.skipped, 1);
        assert_eq!(report.links.internal, 1);
        assert_eq!(report.links.external, 3);
    }

    #[test]
    fn test_json_output_shape() {
        let records = vec![record("https://gone.example/", LinkStatus::Broken, Some(404))];
        let report = assemble(vec![], &records, 0);
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["exit_code"], 1);
        assert_eq!(value["links"]["broken"], 1);
        assert_eq!(value["issues"][0]["category"], "broken_link");
        assert_eq!(value["issues"][0]["severity"], "error");
    }
}
