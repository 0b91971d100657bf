use super::{Extractor, HtmlData, OpenGraphTag};
use crate::{CrawlError, Result};
use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name=description]").unwrap());
static CHARSET: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[charset]").unwrap());
static HTML_LANG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("html[lang]").unwrap());
static META_PROPERTY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property]").unwrap());
static INTER_TAG_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Default upper bound on accepted document size
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Extractor built on `scraper`
///
/// The normalized rendering drops `<script>` and `<style>` elements,
/// comments, `class`/`style` attributes, `data:` image sources and the
/// contents of `<svg>` elements, writes attributes sorted by name, and
/// collapses whitespace between tags.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    max_document_bytes: usize,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = bytes;
        self
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str) -> Result<HtmlData> {
        if html.len() > self.max_document_bytes {
            return Err(CrawlError::ExtractionFailure(format!(
                "document of {} bytes exceeds limit of {}",
                html.len(),
                self.max_document_bytes
            )));
        }

        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let description = first_attr(&document, &DESCRIPTION, "content")
            .trim()
            .to_string();
        let charset = first_attr(&document, &CHARSET, "charset")
            .trim()
            .to_lowercase();
        let language = first_attr(&document, &HTML_LANG, "lang")
            .trim()
            .to_lowercase();

        Ok(HtmlData {
            charset,
            language,
            title,
            description,
            open_graph: open_graph_tags(&document),
            normalized_html: normalize(&document),
        })
    }
}

fn first_attr<'a>(document: &'a Html, selector: &Selector, attr: &str) -> &'a str {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
}

fn open_graph_tags(document: &Html) -> Vec<OpenGraphTag> {
    let mut tags: Vec<OpenGraphTag> = document
        .select(&META_PROPERTY)
        .filter_map(|el| {
            let property = el.value().attr("property")?.trim().to_lowercase();
            let content = el.value().attr("content")?.trim().to_string();
            if !property.starts_with("og:") || content.is_empty() {
                return None;
            }
            Some(OpenGraphTag { property, content })
        })
        .collect();

    tags.sort_by(|a, b| a.property.cmp(&b.property));
    tags
}

fn normalize(document: &Html) -> String {
    let mut out = String::new();

    for node in document.tree.root().children() {
        if let Node::Doctype(doctype) = node.value() {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
    }

    write_tree(document.root_element(), &mut out);
    INTER_TAG_SPACE.replace_all(&out, "><").into_owned()
}

/// Serializes an element and its descendants
///
/// Walks with an explicit stack so page nesting depth never grows the call
/// stack. Each element is pushed once to open and once to close.
fn write_tree(root: ElementRef<'_>, out: &mut String) {
    let mut stack = vec![(*root, false)];

    while let Some((node, closing)) = stack.pop() {
        match node.value() {
            Node::Text(text) if !closing => escape_into(text, false, out),
            Node::Element(element) => {
                let name = element.name();
                if closing {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                    continue;
                }
                if name == "script" || name == "style" {
                    continue;
                }

                write_open_tag(element, out);
                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }

                stack.push((node, true));
                if name != "svg" {
                    stack.extend(node.children().rev().map(|child| (child, false)));
                }
            }
            _ => {}
        }
    }
}

fn write_open_tag(element: &Element, out: &mut String) {
    let name = element.name();
    let mut attrs: Vec<(&str, &str)> = element
        .attrs()
        .filter(|(attr, value)| {
            !matches!(*attr, "class" | "style")
                && !(name == "img" && *attr == "src" && value.trim_start().starts_with("data:"))
        })
        .collect();
    attrs.sort();

    out.push('<');
    out.push_str(name);
    for (attr, value) in attrs {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');
}

fn escape_into(value: &str, attribute: bool, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> HtmlData {
        HtmlExtractor::new().extract(html).unwrap()
    }

    #[test]
    fn test_extracts_metadata() {
        let data = extract(
            r#"<!DOCTYPE html>
            <html lang=" EN-us ">
            <head>
                <meta charset="UTF-8">
                <title>  ArDrive Docs  </title>
                <meta name="description" content=" Permanent storage ">
            </head>
            <body><p>Hello</p></body>
            </html>"#,
        );

        assert_eq!(data.charset, "utf-8");
        assert_eq!(data.language, "en-us");
        assert_eq!(data.title, "ArDrive Docs");
        assert_eq!(data.description, "Permanent storage");
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let data = extract("<p>bare</p>");
        assert_eq!(data.title, "");
        assert_eq!(data.charset, "");
        assert_eq!(data.language, "");
        assert!(data.open_graph.is_empty());
    }

    #[test]
    fn test_open_graph_sorted_and_filtered() {
        let data = extract(
            r#"<html><head>
            <meta property="og:title" content=" Title ">
            <meta property=" OG:Image " content="https://a.arweave.net/i.png">
            <meta property="og:empty" content="">
            <meta property="twitter:card" content="summary">
            </head><body></body></html>"#,
        );

        assert_eq!(
            data.open_graph,
            vec![
                OpenGraphTag {
                    property: "og:image".to_string(),
                    content: "https://a.arweave.net/i.png".to_string()
                },
                OpenGraphTag {
                    property: "og:title".to_string(),
                    content: "Title".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_normalization_removes_noise() {
        let data = extract(
            r#"<html><head><style>p { color: red }</style><script>var x = Date.now();</script></head>
            <body>
                <!-- build 1234 -->
                <p class="fancy" style="margin: 0" id="intro">Hi</p>
                <img src="data:image/png;base64,AAAA" alt="inline">
                <img src="/logo.png" alt="logo">
                <svg viewBox="0 0 10 10"><path d="M0 0"></path></svg>
            </body></html>"#,
        );

        let html = &data.normalized_html;
        assert!(!html.contains("color: red"));
        assert!(!html.contains("Date.now"));
        assert!(!html.contains("build 1234"));
        assert!(!html.contains("fancy"));
        assert!(!html.contains("margin"));
        assert!(!html.contains("base64"));
        assert!(html.contains(r#"<img alt="logo" src="/logo.png">"#));
        assert!(html.contains(r#"<img alt="inline">"#));
        assert!(html.contains("></svg>"));
        assert!(!html.contains("<path"));
        assert!(html.contains(r#"<p id="intro">Hi</p>"#));
    }

    #[test]
    fn test_whitespace_between_tags_collapsed() {
        let data = extract("<html><body>\n  <div>\n    <p>a</p>\n  </div>\n</body></html>");
        assert!(data.normalized_html.contains("<div><p>a</p></div>"));
        assert!(!data.normalized_html.contains("\n"));
    }

    #[test]
    fn test_attributes_sorted_and_escaped() {
        let data = extract(r#"<a title="say &quot;hi&quot;" href="/x?a=1&amp;b=2">t &lt; u</a>"#);
        assert!(data
            .normalized_html
            .contains(r#"<a href="/x?a=1&amp;b=2" title="say &quot;hi&quot;">t &lt; u</a>"#));
    }

    #[test]
    fn test_deterministic_output() {
        let html = r#"<html lang="en"><body><a href="/a" title="t" rel="x">A</a></body></html>"#;
        assert_eq!(extract(html), extract(html));
    }

    #[test]
    fn test_doctype_kept() {
        let data = extract("<!DOCTYPE html><html><body></body></html>");
        assert!(data.normalized_html.starts_with("<!DOCTYPE html><html>"));
    }

    #[test]
    fn test_text_without_tags() {
        let data = extract("<html><head><title>T</title></head><body><p>one</p><p>two</p></body></html>");
        assert_eq!(data.text_without_tags(), "Tonetwo");
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 50_000;
        let html = format!(
            "<html><body>{}x{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );

        let data = extract(&html);
        let normalized = &data.normalized_html;
        assert!(normalized.starts_with("<html><head></head><body><div><div>"));
        assert!(normalized.ends_with("</div></div></body></html>"));
        assert_eq!(
            normalized.matches("<div>").count(),
            normalized.matches("</div>").count()
        );
        assert!(normalized.contains("<div>x</div>"));
    }

    #[test]
    fn test_rejects_oversized_document() {
        let extractor = HtmlExtractor::new().with_max_document_bytes(8);
        assert!(matches!(
            extractor.extract("<p>too long</p>"),
            Err(CrawlError::ExtractionFailure(_))
        ));
    }
}
