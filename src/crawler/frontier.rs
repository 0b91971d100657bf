//! Per-run crawl frontier keyed on content identity
//!
//! Discovered links pass through the hash-fragment policy, gateway address
//! validation and the handler's resolve callback before they are enqueued.
//! Two addresses that dissolve to the same `ar://` identity are only ever
//! enqueued once, whichever gateway they came from.

use crate::crawler::{CrawlHandler, CrawlRequest};
use crate::url::{prefilter_candidate, GatewayUrl, WayfinderUrl};
use std::collections::{HashSet, VecDeque};
use tracing::{trace, warn};

/// A request waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    pub request: CrawlRequest,
    pub depth: u32,
    pub retry_count: u32,
    /// Errors from earlier attempts, oldest first
    pub error_messages: Vec<String>,
}

/// FIFO queue of crawl requests with identity-based uniqueness
#[derive(Debug)]
pub struct Frontier {
    task_id: String,
    extract_hash_urls: bool,
    seen: HashSet<WayfinderUrl>,
    queue: VecDeque<QueuedRequest>,
}

impl Frontier {
    pub fn new(task_id: impl Into<String>, extract_hash_urls: bool) -> Self {
        Self {
            task_id: task_id.into(),
            extract_hash_urls,
            seen: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Enqueues a canonical request unless its identity was seen before
    pub fn push(&mut self, request: CrawlRequest, depth: u32) -> bool {
        if !self.seen.insert(request.wayfinder_url.clone()) {
            trace!(wayfinder_url = %request.wayfinder_url, "Already enqueued");
            return false;
        }

        self.queue.push_back(QueuedRequest {
            request,
            depth,
            retry_count: 0,
            error_messages: Vec::new(),
        });
        true
    }

    /// Enqueues seed requests at depth 0
    pub fn add_seeds(&mut self, seeds: impl IntoIterator<Item = CrawlRequest>) -> usize {
        seeds
            .into_iter()
            .filter(|seed| self.push(seed.clone(), 0))
            .count()
    }

    /// Filters, canonicalizes and enqueues discovered absolute URLs
    ///
    /// Returns the number of requests added.
    pub async fn add_discovered(
        &mut self,
        candidates: &[String],
        depth: u32,
        handler: &dyn CrawlHandler,
    ) -> usize {
        let mut added = 0;

        for candidate in candidates {
            let Some(filtered) = prefilter_candidate(candidate, self.extract_hash_urls) else {
                continue;
            };

            let address = match GatewayUrl::parse(&filtered) {
                Ok(address) => address,
                Err(e) => {
                    warn!(task_id = %self.task_id, url = %filtered, error = %e, "Invalid gateway URL");
                    continue;
                }
            };

            let request = match handler.on_resolve_url(address).await {
                Ok(request) => request,
                Err(e) => {
                    warn!(task_id = %self.task_id, url = %filtered, error = %e, "Failed to resolve URL");
                    continue;
                }
            };

            if self.push(request, depth) {
                added += 1;
            }
        }

        added
    }

    /// Puts a request back for another attempt, bypassing uniqueness
    pub fn requeue(&mut self, queued: QueuedRequest) {
        self.queue.push_back(queued);
    }

    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct identities ever enqueued
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
