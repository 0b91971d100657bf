//! Crawl engines and the frontier they drive
//!
//! An engine fetches pages starting from a task's seed requests and reports
//! every page, failure and discovered link back through a [`CrawlHandler`].
//! Link canonicalization and duplicate detection live behind that handler,
//! so engines only deal with gateway addresses and HTML.

mod engine;
mod fetcher;
mod frontier;
mod html_crawler;
mod page_init;
mod parser;

pub use engine::{
    CrawlEngine, CrawlHandler, CrawlRequest, CrawlRun, CrawlSummary, CrawlerKind, PageData,
    PageVerdict, ScrapeFailure,
};
pub use fetcher::{build_http_client, fetch_page, FetchResult, MAX_REDIRECTS};
pub use frontier::{Frontier, QueuedRequest};
pub use html_crawler::HtmlCrawler;
pub use page_init::PageInitScript;
pub use parser::{extract_found_urls, extract_hrefs};
