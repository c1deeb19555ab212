// src/extract/html.rs
// =============================================================================
// Extracts hyperlink hrefs from rendered HTML.
//
// We use the `scraper` crate which parses HTML into a DOM and supports CSS
// selectors, so finding every anchor is one query: "a[href]".
//
// scraper's DOM has no source positions, so line numbers are recovered by
// locating the href text in the raw page. Good enough for CI diagnostics;
// a miss just means the issue is reported file-only.
// =============================================================================

use scraper::{Html, Selector};

use super::RawLink;

/// Extracts every anchor href from an HTML document, in document order.
pub fn extract_hrefs(html: &str) -> Vec<RawLink> {
    let document = Html::parse_document(html);

    // The selector is a constant and known to be valid, so unwrap is fine
    let selector = Selector::parse("a[href]").unwrap();

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| RawLink {
            href: href.to_string(),
            line: line_of(html, href),
        })
        .collect()
}

// Finds the 1-based line of the first occurrence of `needle` in the source.
pub(super) fn line_of(content: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    content
        .find(needle)
        .map(|idx| content[..idx].matches('\n').count() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_anchors() {
        let html = r#"
            <a href="https://example.net/">Ext</a>
            <a href="/guide/">Guide</a>
            <a href="../up/">Up</a>
        "#;
        let links = extract_hrefs(html);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].href, "https://example.net/");
    }

    #[test]
    fn test_anchor_without_href_ignored() {
        let html = r#"<a name="top">Top</a><a href="/x">X</a>"#;
        let links = extract_hrefs(html);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_line_numbers_recovered() {
        let html = "<html>\n<body>\n<a href=\"/third-line\">x</a>\n</body>";
        let links = extract_hrefs(html);
        assert_eq!(links[0].line, Some(3));
    }

    #[test]
    fn test_line_of_missing_needle() {
        assert_eq!(line_of("abc", "zzz"), None);
    }
}
