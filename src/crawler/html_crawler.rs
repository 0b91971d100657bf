//! Plain HTTP crawl engine
//!
//! Requests are taken from the frontier in batches no larger than the
//! concurrency limit and the remaining page budget, fetched concurrently,
//! and their outcomes applied to the frontier one at a time.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchResult};
use crate::crawler::frontier::{Frontier, QueuedRequest};
use crate::crawler::parser::extract_found_urls;
use crate::crawler::{
    CrawlEngine, CrawlHandler, CrawlRequest, CrawlRun, CrawlSummary, CrawlerKind, PageData,
    PageVerdict, ScrapeFailure,
};
use crate::robots::RobotsCache;
use crate::url::is_relative;
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to one request
#[derive(Debug)]
enum Outcome {
    /// Page went through `on_page`; `links` are absolute gateway addresses to follow
    Handled { links: Vec<String>, depth: u32 },
    Skipped,
    Retry(QueuedRequest),
    Failed,
}

/// Per-run values shared by concurrent requests
struct RunContext {
    task_id: String,
    extract_hash_urls: bool,
    handler: Arc<dyn CrawlHandler>,
}

/// Fetches pages over HTTP without executing scripts
pub struct HtmlCrawler {
    client: Client,
    robots: Option<RobotsCache>,
    max_concurrency: usize,
    max_retries: u32,
}

impl HtmlCrawler {
    /// Builds an engine with its own HTTP client
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;
        Ok(Self::with_client(client, crawler, user_agent))
    }

    /// Builds an engine around an existing client
    pub fn with_client(client: Client, crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Self {
        let robots = crawler
            .respect_robots_txt
            .then(|| RobotsCache::new(client.clone(), user_agent.crawler_name.clone()));

        Self {
            client,
            robots,
            max_concurrency: crawler.max_concurrency.max(1),
            max_retries: crawler.max_request_retries,
        }
    }

    async fn process(&self, ctx: &RunContext, queued: QueuedRequest) -> Outcome {
        let url = queued.request.gateway_url.clone();

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(url.as_url()).await {
                debug!(task_id = %ctx.task_id, url = %url, "Disallowed by robots.txt");
                return Outcome::Skipped;
            }
        }

        let error = match fetch_page(&self.client, url.as_str()).await {
            FetchResult::Success { headers, body, .. } => {
                let found_urls = extract_found_urls(&body, ctx.extract_hash_urls);
                let page = PageData {
                    task_id: ctx.task_id.clone(),
                    request: queued.request.clone(),
                    html: body,
                    headers,
                    found_urls: found_urls.clone(),
                };

                match ctx.handler.on_page(page).await {
                    Ok(PageVerdict::Stored) => {
                        return Outcome::Handled {
                            links: follow_links(&queued.request, &found_urls),
                            depth: queued.depth,
                        }
                    }
                    Ok(PageVerdict::Duplicate) => {
                        return Outcome::Handled {
                            links: Vec::new(),
                            depth: queued.depth,
                        }
                    }
                    Err(e) => e.to_string(),
                }
            }
            FetchResult::ContentMismatch { content_type } => {
                debug!(task_id = %ctx.task_id, url = %url, content_type = %content_type, "Skipping non-HTML page");
                return Outcome::Skipped;
            }
            other => other.describe(),
        };

        self.retry_or_fail(ctx, queued, error).await
    }

    async fn retry_or_fail(&self, ctx: &RunContext, mut queued: QueuedRequest, error: String) -> Outcome {
        queued.error_messages.push(error);

        if queued.retry_count >= self.max_retries {
            warn!(
                task_id = %ctx.task_id,
                url = %queued.request.gateway_url,
                retries = queued.retry_count,
                errors = ?queued.error_messages,
                "Giving up on request"
            );
            return Outcome::Failed;
        }

        let failure = ScrapeFailure {
            task_id: ctx.task_id.clone(),
            failed_url: queued.request.gateway_url.clone(),
            retry_count: queued.retry_count,
            max_retries: self.max_retries,
            error_messages: queued.error_messages.clone(),
        };

        match ctx.handler.on_scrape_error(failure).await {
            Ok(replacement) => {
                queued.request = CrawlRequest::new(replacement, queued.request.wayfinder_url);
                queued.retry_count += 1;
                Outcome::Retry(queued)
            }
            Err(e) => {
                warn!(task_id = %ctx.task_id, url = %queued.request.gateway_url, error = %e, "No replacement gateway");
                Outcome::Failed
            }
        }
    }
}

/// Resolves relative links against the page's gateway address
fn follow_links(request: &CrawlRequest, found_urls: &[String]) -> Vec<String> {
    found_urls
        .iter()
        .filter(|link| is_relative(link))
        .filter_map(|link| request.gateway_url.as_url().join(link).ok())
        .map(|url| url.to_string())
        .collect()
}

#[async_trait]
impl CrawlEngine for HtmlCrawler {
    fn kind(&self) -> CrawlerKind {
        CrawlerKind::Html
    }

    async fn start(&self, run: CrawlRun) -> Result<CrawlSummary> {
        let ctx = RunContext {
            task_id: run.task_id.clone(),
            extract_hash_urls: run.extract_hash_urls,
            handler: Arc::clone(&run.handler),
        };

        let mut frontier = Frontier::new(run.task_id.clone(), run.extract_hash_urls);
        frontier.add_seeds(run.seeds);

        let mut summary = CrawlSummary::default();

        info!(task_id = %run.task_id, seeds = frontier.len(), "Crawl started");

        while !frontier.is_empty() && summary.finished() < run.max_pages {
            let remaining = (run.max_pages - summary.finished()) as usize;
            let budget = self.max_concurrency.min(remaining);

            let batch: Vec<QueuedRequest> = std::iter::from_fn(|| frontier.pop())
                .take(budget)
                .collect();

            let outcomes: Vec<Outcome> = stream::iter(batch)
                .map(|queued| self.process(&ctx, queued))
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    Outcome::Handled { links, depth } => {
                        summary.handled += 1;
                        let next_depth = depth + 1;
                        if next_depth <= run.max_depth && !links.is_empty() {
                            frontier
                                .add_discovered(&links, next_depth, ctx.handler.as_ref())
                                .await;
                        }
                    }
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::Retry(queued) => frontier.requeue(queued),
                    Outcome::Failed => summary.failed += 1,
                }
            }

            debug!(
                task_id = %run.task_id,
                queued = frontier.len(),
                handled = summary.handled,
                "Batch finished"
            );
        }

        info!(
            task_id = %run.task_id,
            handled = summary.handled,
            failed = summary.failed,
            skipped = summary.skipped,
            discovered = frontier.seen_count(),
            "Crawl finished"
        );

        Ok(summary)
    }
}
