// src/loader/mod.rs
// =============================================================================
// Content Loader: reads the rendered site tree and the timeline dataset from
// disk and hands in-memory representations to the validators.
//
// No business logic lives here. The two entry points are:
// - load_site:     walk the rendered output tree into a SiteTree
// - load_timeline: read and YAML-parse the timeline dataset
//
// Failure taxonomy: everything in this module is a LoadError, the only
// fatal class in the pipeline. A LoadError aborts before any checks run and
// maps to exit code 2, so CI can tell "broken pipeline" from "bad content".
// =============================================================================

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::timeline::TimelineDataset;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("site root {0} does not exist or is not a directory")]
    SiteRoot(PathBuf),

    #[error("timeline dataset not found: {0}")]
    TimelineMissing(PathBuf),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timeline dataset {path} is not valid YAML")]
    TimelineFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// What kind of source a content page is. The rendered tree is HTML, but the
// platform also ships markdown that survives rendering (README-style notes),
// and links in those break just as visibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Html,
    Markdown,
}

// A single output page, read-only after loading.
#[derive(Debug, Clone)]
pub struct ContentPage {
    /// Path relative to the site root, e.g. "guide/intro/index.html"
    pub path: PathBuf,
    /// Identifier that timeline cross-references resolve against,
    /// e.g. "guide/intro"
    pub slug: String,
    pub content: String,
    pub kind: PageKind,
}

// The loaded output tree: parsed pages plus the full file set.
//
// `files` includes assets (images, CSS, ...) so that internal links to
// non-page resources can be resolved without touching the filesystem again.
#[derive(Debug, Default)]
pub struct SiteTree {
    pub pages: Vec<ContentPage>,
    pub files: HashSet<String>,
}

impl SiteTree {
    /// True if the normalized site path exists anywhere in the output tree.
    pub fn has_file(&self, rel_path: &str) -> bool {
        self.files.contains(rel_path)
    }

    pub fn page_by_slug(&self, slug: &str) -> Option<&ContentPage> {
        self.pages.iter().find(|p| p.slug == slug)
    }
}

/// Walks the rendered output tree rooted at `root`.
///
/// An empty tree is fine (zero pages, zero findings downstream); a missing
/// root is not, since it means the render step never ran.
pub fn load_site(root: &Path) -> Result<SiteTree, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::SiteRoot(root.to_path_buf()));
    }

    let mut tree = SiteTree::default();
    walk(root, root, &mut tree)?;

    // Walk order depends on the filesystem; sort so downstream output is
    // reproducible across runs.
    tree.pages.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(tree)
}

fn walk(dir: &Path, root: &Path, tree: &mut SiteTree) -> Result<(), LoadError> {
    let entries = fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            walk(&path, root, tree)?;
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .expect("walked path is always under root")
            .to_path_buf();
        tree.files.insert(rel.to_string_lossy().into_owned());

        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("html") | Some("htm") => PageKind::Html,
            Some("md") => PageKind::Markdown,
            _ => continue, // asset: recorded in `files`, not parsed
        };

        // Unreadable or non-UTF-8 page content is skipped rather than fatal;
        // the file still counts as present for internal link resolution.
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => continue,
        };

        let slug = slug_for(&rel);
        tree.pages.push(ContentPage {
            path: rel,
            slug,
            content,
            kind,
        });
    }

    Ok(())
}

// Derives the cross-reference identifier for a page path.
//
// "guide/trams/index.html" -> "guide/trams"
// "guide/trams.html"       -> "guide/trams"
// "index.html"             -> "index"
fn slug_for(rel: &Path) -> String {
    let s = rel.to_string_lossy();
    let trimmed = s
        .trim_end_matches(".html")
        .trim_end_matches(".htm")
        .trim_end_matches(".md")
        .trim_end_matches("/index")
        .trim_end_matches('/');

    if trimmed.is_empty() || trimmed == "index" {
        "index".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reads and parses the timeline dataset file.
///
/// Entries are kept as raw YAML values here: a file that is valid YAML but
/// has one bad entry must still load, so the validator can report every
/// defect in one run. Only an absent file or broken YAML is fatal.
pub fn load_timeline(path: &Path) -> Result<TimelineDataset, LoadError> {
    if !path.is_file() {
        return Err(LoadError::TimelineMissing(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let format_error = |source| LoadError::TimelineFormat {
        path: path.to_path_buf(),
        source,
    };

    let value: serde_yaml::Value = serde_yaml::from_str(&text).map_err(format_error)?;

    // Two accepted shapes: the full mapping with an `order` declaration, or
    // the legacy bare list of entries (order then takes its default).
    let mut dataset: TimelineDataset = match value {
        serde_yaml::Value::Sequence(entries) => TimelineDataset {
            order: Default::default(),
            entries,
            source: PathBuf::new(),
        },
        other => serde_yaml::from_value(other).map_err(format_error)?,
    };

    dataset.source = path.to_path_buf();
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_root_is_load_error() {
        let err = load_site(Path::new("/nonexistent/site")).unwrap_err();
        assert!(matches!(err, LoadError::SiteRoot(_)));
    }

    #[test]
    fn test_empty_tree_loads_with_zero_pages() {
        let dir = tempfile::tempdir().unwrap();
        let tree = load_site(dir.path()).unwrap();
        assert!(tree.pages.is_empty());
        assert!(tree.files.is_empty());
    }

    #[test]
    fn test_collects_pages_and_assets() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<html></html>");
        write(dir.path(), "guide/trams/index.html", "<html></html>");
        write(dir.path(), "notes/history.md", "# History");
        write(dir.path(), "css/site.css", "body {}");

        let tree = load_site(dir.path()).unwrap();
        assert_eq!(tree.pages.len(), 3);
        assert!(tree.has_file("css/site.css"));
        assert!(tree.has_file("guide/trams/index.html"));
        assert!(!tree.has_file("guide/trams"));
    }

    #[test]
    fn test_slug_derivation() {
        assert_eq!(slug_for(Path::new("guide/trams/index.html")), "guide/trams");
        assert_eq!(slug_for(Path::new("guide/trams.html")), "guide/trams");
        assert_eq!(slug_for(Path::new("notes/history.md")), "notes/history");
        assert_eq!(slug_for(Path::new("index.html")), "index");
    }

    #[test]
    fn test_pages_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.html", "");
        write(dir.path(), "a.html", "");
        let tree = load_site(dir.path()).unwrap();
        assert!(tree.pages[0].path < tree.pages[1].path);
    }

    #[test]
    fn test_missing_timeline_is_typed_error() {
        let err = load_timeline(Path::new("/nonexistent/timeline.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::TimelineMissing(_)));
    }

    #[test]
    fn test_broken_yaml_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.yaml");
        fs::write(&path, "entries: [unterminated").unwrap();
        let err = load_timeline(&path).unwrap_err();
        assert!(matches!(err, LoadError::TimelineFormat { .. }));
    }

    #[test]
    fn test_empty_timeline_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.yaml");
        fs::write(&path, "").unwrap();
        let err = load_timeline(&path).unwrap_err();
        assert!(matches!(err, LoadError::TimelineFormat { .. }));
    }

    #[test]
    fn test_legacy_bare_list_form_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.yaml");
        fs::write(
            &path,
            "- date: 1903-04-05\n  title: Electric trams\n- date: 1863-01-10\n  title: Metropolitan Railway\n",
        )
        .unwrap();
        let dataset = load_timeline(&path).unwrap();
        assert_eq!(dataset.entries.len(), 2);
        assert_eq!(dataset.order, crate::timeline::DatasetOrder::Descending);
    }

    #[test]
    fn test_valid_timeline_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.yaml");
        fs::write(
            &path,
            "order: ascending\nentries:\n  - date: 1863-01-10\n    title: Metropolitan Railway opens\n",
        )
        .unwrap();
        let dataset = load_timeline(&path).unwrap();
        assert_eq!(dataset.entries.len(), 1);
        assert_eq!(dataset.source, path);
    }
}
