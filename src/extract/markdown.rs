// src/extract/markdown.rs
// =============================================================================
// Extracts link destinations from Markdown text.
//
// We use the `pulldown-cmark` crate which parses markdown into a stream of
// events (heading, paragraph, link, ...) following the CommonMark spec.
// The offset iterator variant also tells us where in the source each event
// came from, which gives us line numbers for free.
// =============================================================================

use pulldown_cmark::{Event, Parser, Tag};

use super::RawLink;

/// Extracts every link destination from markdown text, in document order.
///
/// All destinations are returned, relative ones included; classification
/// happens in the extractor, same as for HTML hrefs.
pub fn extract_hrefs(markdown: &str) -> Vec<RawLink> {
    let mut links = Vec::new();

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        // In pulldown-cmark 0.9, Link is Tag::Link(link_type, dest_url, title)
        if let Event::Start(Tag::Link(_link_type, dest_url, _title)) = event {
            links.push(RawLink {
                href: dest_url.to_string(),
                line: Some(markdown[..range.start].matches('\n').count() + 1),
            });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_link() {
        let markdown = "Check out [the guide](https://guide.example.org)!";
        let links = extract_hrefs(markdown);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://guide.example.org");
        assert_eq!(links[0].line, Some(1));
    }

    #[test]
    fn test_extract_multiple_links_with_lines() {
        let markdown = "\
# Sources

- [Transit study](https://transit.example.net/study)
- [City archive](https://archive.example.net/)
";
        let links = extract_hrefs(markdown);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].line, Some(3));
        assert_eq!(links[1].line, Some(4));
    }

    #[test]
    fn test_relative_destinations_are_kept() {
        // Relative links matter too: they must resolve in the rendered tree
        let links = extract_hrefs("See [history](../history/).");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "../history/");
    }

    #[test]
    fn test_mailto_destinations_are_kept_for_classification() {
        let links = extract_hrefs("Mail [us](mailto:ed@example.net).");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_plain_text_has_no_links() {
        assert!(extract_hrefs("No links here, just prose.").is_empty());
    }
}
