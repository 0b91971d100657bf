//! Link extraction from fetched pages

use crate::url::{apply_hash_policy, normalize_link};
use scraper::{Html, Selector};
use std::sync::LazyLock;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Collects the cleaned `href` of every anchor, in document order
///
/// Values are percent-decoded and trimmed, empty and bare `/` links are
/// dropped. Case is preserved since paths on a gateway are case-sensitive.
///
/// # Example
///
/// ```
/// use arns_crawler::crawler::extract_hrefs;
///
/// let html = r#"<a href="/About%20Us">a</a><a href="/">home</a><a>none</a>"#;
/// assert_eq!(extract_hrefs(html), vec!["/About Us".to_string()]);
/// ```
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(normalize_link)
        .collect()
}

/// Extracts hrefs and applies the hash-fragment policy to each
pub fn extract_found_urls(html: &str, extract_hash_urls: bool) -> Vec<String> {
    extract_hrefs(html)
        .into_iter()
        .filter_map(|link| apply_hash_policy(&link, extract_hash_urls))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html>
        <head><link rel="stylesheet" href="/style.css"></head>
        <body>
            <nav><a href="/docs">Docs</a></nav>
            <a href=" ./guide ">Guide</a>
            <a href="https://other.arweave.net/">Other</a>
            <a href="#/route">Route</a>
            <a href="#top">Top</a>
            <a href="/">Home</a>
            <a href="">Empty</a>
            <a name="anchor">No href</a>
        </body>
        </html>
    "##;

    #[test]
    fn test_extract_hrefs_in_document_order() {
        assert_eq!(
            extract_hrefs(PAGE),
            vec![
                "/docs",
                "./guide",
                "https://other.arweave.net/",
                "#/route",
                "#top"
            ]
        );
    }

    #[test]
    fn test_found_urls_truncate_fragments() {
        assert_eq!(
            extract_found_urls(PAGE, false),
            vec!["/docs", "./guide", "https://other.arweave.net/"]
        );
    }

    #[test]
    fn test_found_urls_keep_fragments() {
        let found = extract_found_urls(PAGE, true);
        assert!(found.contains(&"#/route".to_string()));
        assert!(found.contains(&"#top".to_string()));
    }

    #[test]
    fn test_decodes_hrefs() {
        let html = r#"<a href="/a%2Fb%20c">x</a>"#;
        assert_eq!(extract_hrefs(html), vec!["/a/b c"]);
    }

    #[test]
    fn test_no_links() {
        assert!(extract_hrefs("<p>nothing here</p>").is_empty());
    }
}
