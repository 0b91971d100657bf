//! Storage module for per-task page records
//!
//! Every crawl task opens its own session. Stored pages are keyed by the
//! SHA-256 of their normalized HTML and exported as JSON lines when the task
//! finishes.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqlitePageStorage, SqlitePageStore};
pub use traits::{PageDataStorage, PageDataStore, StorageError, StorageResult};

use crate::extract::HtmlData;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One HTTP response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A stored page: extracted fields plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    #[serde(flatten)]
    pub html: HtmlData,
    pub tx_id: Option<String>,
    pub data_id: Option<String>,
    pub arns_name: String,
    pub wayfinder_url: String,
    pub gateway_url: String,
    pub headers: Vec<Header>,
    pub relative_urls: Vec<String>,
    pub absolute_urls: Vec<String>,
}

impl PageRecord {
    /// Primary key of the record
    pub fn html_hash(&self) -> String {
        hex::encode(Sha256::digest(self.html.normalized_html.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_hash_depends_on_normalized_html_only() {
        let mut a = PageRecord {
            html: HtmlData {
                normalized_html: "<p>x</p>".to_string(),
                ..HtmlData::default()
            },
            tx_id: None,
            data_id: None,
            arns_name: "a".to_string(),
            wayfinder_url: "ar://a/".to_string(),
            gateway_url: "https://a.arweave.net/".to_string(),
            headers: Vec::new(),
            relative_urls: Vec::new(),
            absolute_urls: Vec::new(),
        };
        let first = a.html_hash();
        a.arns_name = "b".to_string();
        assert_eq!(first, a.html_hash());
        assert_eq!(first.len(), 64);

        a.html.normalized_html.push(' ');
        assert_ne!(first, a.html_hash());
    }
}
