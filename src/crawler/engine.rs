//! Crawl engine interface and the callbacks it drives

use crate::crawler::PageInitScript;
use crate::storage::Header;
use crate::url::{GatewayUrl, WayfinderUrl};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One frontier entry: where to fetch and what it logically is
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlRequest {
    pub gateway_url: GatewayUrl,
    pub wayfinder_url: WayfinderUrl,
}

impl CrawlRequest {
    pub fn new(gateway_url: GatewayUrl, wayfinder_url: WayfinderUrl) -> Self {
        Self {
            gateway_url,
            wayfinder_url,
        }
    }
}

/// Engine variant used for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlerKind {
    /// Plain HTTP fetch and DOM parse
    Html,
    /// Headless browser that executes page scripts
    Browser,
}

impl CrawlerKind {
    pub fn for_javascript(execute_javascript: bool) -> Self {
        if execute_javascript {
            Self::Browser
        } else {
            Self::Html
        }
    }
}

impl fmt::Display for CrawlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

/// A fetched page handed to [`CrawlHandler::on_page`]
#[derive(Debug, Clone)]
pub struct PageData {
    pub task_id: String,
    pub request: CrawlRequest,
    pub html: String,
    pub headers: Vec<Header>,
    /// Hrefs found on the page after the hash-fragment policy
    pub found_urls: Vec<String>,
}

/// What the handler did with a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Stored,
    /// Discarded as a near-duplicate; its links are not followed
    Duplicate,
}

/// Context for a failed fetch
#[derive(Debug, Clone)]
pub struct ScrapeFailure {
    pub task_id: String,
    pub failed_url: GatewayUrl,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_messages: Vec<String>,
}

/// Callbacks a crawl engine invokes while it runs
///
/// Calls for one task may arrive concurrently.
#[async_trait]
pub trait CrawlHandler: Send + Sync {
    /// Processes a fetched page. An error makes the engine retry it.
    async fn on_page(&self, page: PageData) -> Result<PageVerdict>;

    /// Returns a replacement address for a failed fetch, never the failed one
    async fn on_scrape_error(&self, failure: ScrapeFailure) -> Result<GatewayUrl>;

    /// Canonicalizes a discovered address before it is enqueued
    async fn on_resolve_url(&self, address: GatewayUrl) -> Result<CrawlRequest>;
}

/// Everything an engine needs for one run
pub struct CrawlRun {
    pub task_id: String,
    pub seeds: Vec<CrawlRequest>,
    pub extract_hash_urls: bool,
    pub max_depth: u32,
    pub max_pages: u32,
    pub handler: Arc<dyn CrawlHandler>,
    /// Only given to engines that execute page scripts
    pub page_init: Option<PageInitScript>,
}

/// Request counters reported when a run ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages passed to `on_page` successfully
    pub handled: u32,
    /// Requests given up after retries
    pub failed: u32,
    /// Requests skipped by robots.txt or content type
    pub skipped: u32,
}

impl CrawlSummary {
    pub fn finished(&self) -> u32 {
        self.handled + self.failed + self.skipped
    }
}

/// A page fetching engine
#[async_trait]
pub trait CrawlEngine: Send + Sync {
    fn kind(&self) -> CrawlerKind;

    /// Crawls from the seeds until the frontier is empty or `max_pages` is reached
    async fn start(&self, run: CrawlRun) -> Result<CrawlSummary>;
}
