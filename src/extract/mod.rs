//! Page content extraction
//!
//! Extraction turns raw HTML into the stable fields stored per page and a
//! normalized HTML rendering used for duplicate detection.

mod html;

pub use html::HtmlExtractor;

use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One `og:*` meta tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGraphTag {
    pub property: String,
    pub content: String,
}

/// Fields extracted from a page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlData {
    pub charset: String,
    pub language: String,
    pub title: String,
    pub description: String,
    pub open_graph: Vec<OpenGraphTag>,
    pub normalized_html: String,
}

impl HtmlData {
    /// Normalized HTML with every tag removed
    pub fn text_without_tags(&self) -> String {
        strip_tags(&self.normalized_html)
    }
}

/// Extracts page fields from raw HTML. Must be deterministic.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<HtmlData>;
}

/// Removes everything that looks like a tag
pub fn strip_tags(html: &str) -> String {
    TAG_PATTERN.replace_all(html, "").into_owned()
}
