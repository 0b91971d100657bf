//! Task scheduler
//!
//! Owns the task table and runs at most one task at a time. A task is
//! handed a driver loop when it is submitted to an idle scheduler; the loop
//! keeps picking up queued tasks in submission order until none remain.

use crate::config::ServiceConfig;
use crate::crawler::{
    CrawlEngine, CrawlHandler, CrawlRequest, CrawlRun, CrawlerKind, PageData, PageInitScript,
    PageVerdict, ScrapeFailure,
};
use crate::dedup::{DuplicateStore, PageDeduplicator};
use crate::extract::Extractor;
use crate::resolver::ArnsResolver;
use crate::service::{CrawlTask, TaskConfig, TaskStatus, TaskTable};
use crate::storage::{Header, PageDataStorage, PageDataStore, PageRecord, StorageError};
use crate::url::{split_links, GatewayUrl};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Response header carrying the transaction id a name resolved to
pub const RESOLVED_ID_HEADER: &str = "x-arns-resolved-id";

/// Response header carrying the data item id served
pub const DATA_ID_HEADER: &str = "x-ar-io-data-id";

/// Scheduler limits and persistence settings
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub max_tasks: usize,
    pub task_timeout: Option<Duration>,
    /// Where the task table is saved after every task, if anywhere
    pub tasks_path: Option<PathBuf>,
}

impl SchedulerOptions {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            max_tasks: config.max_tasks,
            task_timeout: (config.task_timeout_secs > 0)
                .then(|| Duration::from_secs(config.task_timeout_secs)),
            tasks_path: config
                .persist_tasks
                .then(|| config.storage_path.join("tasks.json")),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_tasks: 100,
            task_timeout: None,
            tasks_path: None,
        }
    }
}

/// Collaborators a scheduler wires into each task
pub struct SchedulerParts {
    pub resolver: Arc<dyn ArnsResolver>,
    pub extractor: Arc<dyn Extractor>,
    pub storage: Arc<dyn PageDataStorage>,
    pub deduplicator: Arc<dyn PageDeduplicator>,
    pub engines: Vec<Arc<dyn CrawlEngine>>,
}

/// Stores opened for the running task
#[derive(Default)]
struct TaskSessions {
    pages: Option<Arc<dyn PageDataStore>>,
    duplicates: Option<Arc<dyn DuplicateStore>>,
}

struct SchedulerState {
    table: TaskTable,
    sessions: HashMap<String, TaskSessions>,
}

struct SchedulerInner {
    resolver: Arc<dyn ArnsResolver>,
    extractor: Arc<dyn Extractor>,
    storage: Arc<dyn PageDataStorage>,
    deduplicator: Arc<dyn PageDeduplicator>,
    engines: HashMap<CrawlerKind, Arc<dyn CrawlEngine>>,
    options: SchedulerOptions,
    state: Mutex<SchedulerState>,
    idle: Notify,
}

/// Accepts crawl tasks and runs them one at a time
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<SchedulerInner>,
}

impl TaskScheduler {
    /// Creates a scheduler, loading the saved task table when persistence is on
    pub fn new(parts: SchedulerParts, options: SchedulerOptions) -> Result<Self> {
        let table = match &options.tasks_path {
            Some(path) => TaskTable::load(path, options.max_tasks)?,
            None => TaskTable::new(options.max_tasks),
        };

        let engines = parts
            .engines
            .into_iter()
            .map(|engine| (engine.kind(), engine))
            .collect();

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                resolver: parts.resolver,
                extractor: parts.extractor,
                storage: parts.storage,
                deduplicator: parts.deduplicator,
                engines,
                options,
                state: Mutex::new(SchedulerState {
                    table,
                    sessions: HashMap::new(),
                }),
                idle: Notify::new(),
            }),
        })
    }

    /// Submits a task and starts it if nothing else is running
    ///
    /// Returns the task as queued. Must be called from within a Tokio
    /// runtime.
    pub fn create(&self, config: TaskConfig) -> Result<CrawlTask> {
        let config = config.validate()?;
        let mut task = CrawlTask::new(Uuid::new_v4().to_string(), config);
        task.advance(TaskStatus::Queued)?;

        let start = {
            let mut state = self.inner.lock();
            state.table.insert(task.clone());
            if state.table.running().is_none() {
                state.table.set_running(Some(task.id.clone()));
                true
            } else {
                false
            }
        };

        info!(
            task_id = %task.id,
            names = ?task.config.arns_names,
            starting = start,
            "Task submitted"
        );

        if start {
            tokio::spawn(drive(Arc::clone(&self.inner), task.id.clone()));
        }

        Ok(task)
    }

    /// All known tasks in submission order
    pub fn list(&self) -> Vec<CrawlTask> {
        self.inner.lock().table.list()
    }

    pub fn get(&self, task_id: &str) -> Result<CrawlTask> {
        self.inner
            .lock()
            .table
            .get(task_id)
            .cloned()
            .ok_or_else(|| CrawlError::TaskNotFound(task_id.to_string()))
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().table.running().is_none()
    }

    /// Waits until no task is running or queued
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_task<F>(&self, task_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut CrawlTask),
    {
        let mut state = self.lock();
        f(state.table.get_mut(task_id)?);
        Ok(())
    }

    fn sessions(&self, task_id: &str) -> Result<(Arc<dyn PageDataStore>, Arc<dyn DuplicateStore>)> {
        let state = self.lock();
        let sessions = state
            .sessions
            .get(task_id)
            .ok_or_else(|| CrawlError::TaskNotFound(task_id.to_string()))?;

        match (&sessions.pages, &sessions.duplicates) {
            (Some(pages), Some(duplicates)) => Ok((Arc::clone(pages), Arc::clone(duplicates))),
            _ => Err(CrawlError::TaskNotFound(format!(
                "{} has no open stores",
                task_id
            ))),
        }
    }

    async fn run_task(self: &Arc<Self>, task_id: &str) -> Result<()> {
        let config = {
            let mut state = self.lock();
            let task = state.table.get_mut(task_id)?;
            task.advance(TaskStatus::Running)?;
            let config = task.config.clone();
            state
                .sessions
                .insert(task_id.to_string(), TaskSessions::default());
            config
        };

        info!(task_id, names = ?config.arns_names, "Task started");

        let pages = self.storage.open(task_id).await?;
        self.with_sessions(task_id, |s| s.pages = Some(pages));

        let duplicates = self
            .deduplicator
            .open(task_id, config.similarity_threshold)?;
        self.with_sessions(task_id, |s| s.duplicates = Some(duplicates));

        let mut seeds = Vec::with_capacity(config.arns_names.len());
        for name in &config.arns_names {
            let gateway_url = self.resolver.resolve(name).await?;
            let wayfinder_url = self.resolver.dissolve(&gateway_url);
            debug!(task_id, name, gateway_url = %gateway_url, "Seed resolved");
            seeds.push(CrawlRequest::new(gateway_url, wayfinder_url));
        }

        let kind = CrawlerKind::for_javascript(config.execute_javascript);
        let engine = self.engines.get(&kind).cloned().ok_or_else(|| {
            CrawlError::CrawlEngine(format!("no {} crawl engine available", kind))
        })?;

        let run = CrawlRun {
            task_id: task_id.to_string(),
            seeds,
            extract_hash_urls: config.extract_hash_urls,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            handler: Arc::new(TaskHandler {
                inner: Arc::clone(self),
                task_id: task_id.to_string(),
            }),
            page_init: (kind == CrawlerKind::Browser).then(PageInitScript::default),
        };

        let summary = engine.start(run).await?;
        info!(
            task_id,
            handled = summary.handled,
            failed = summary.failed,
            skipped = summary.skipped,
            "Crawl engine finished"
        );
        Ok(())
    }

    fn with_sessions<F>(&self, task_id: &str, f: F)
    where
        F: FnOnce(&mut TaskSessions),
    {
        let mut state = self.lock();
        f(state.sessions.entry(task_id.to_string()).or_default());
    }

    /// Closes the task's stores, records the outcome and claims the next task
    async fn finalize(&self, task_id: &str, outcome: Result<()>) -> Option<String> {
        let mut error = outcome.err().map(|e| e.to_string());

        let sessions = self.lock().sessions.remove(task_id);
        if let Some(sessions) = sessions {
            if let Some(duplicates) = sessions.duplicates {
                debug!(task_id, pages = duplicates.len(), "Closed duplicate store");
            }

            if let Some(pages) = sessions.pages {
                match pages.export().await {
                    Ok(files) => debug!(task_id, files = ?files, "Exported task data"),
                    Err(e) => {
                        error!(task_id, error = %e, "Export failed");
                        if error.is_none() {
                            error = Some(format!("export failed: {}", e));
                        }
                    }
                }
                if let Err(e) = pages.close().await {
                    warn!(task_id, error = %e, "Failed to close page store");
                }
            }
        }

        let snapshot = {
            let mut state = self.lock();

            match state.table.get_mut(task_id) {
                Ok(task) => {
                    if let Err(e) = task.finish(error.clone()) {
                        warn!(task_id, error = %e, "Could not record task outcome");
                    }
                    match &task.error {
                        Some(message) => error!(task_id, error = %message, "Task failed"),
                        None => info!(
                            task_id,
                            pages = task.page_count,
                            duplicates = task.duplicate_count,
                            "Task completed"
                        ),
                    }
                }
                Err(e) => warn!(task_id, error = %e, "Finished task no longer in table"),
            }

            self.options.tasks_path.as_ref().map(|_| state.table.list())
        };

        if let (Some(path), Some(tasks)) = (&self.options.tasks_path, snapshot) {
            if let Err(e) = TaskTable::save(&tasks, path) {
                warn!(path = %path.display(), error = %e, "Failed to save task table");
            }
        }

        // The run slot stays claimed until here so tasks submitted meanwhile are picked up
        let mut state = self.lock();
        let next = state.table.next_queued(task_id);
        state.table.set_running(next.clone());
        next
    }
}

/// Runs tasks until the queue is empty, then signals idle
async fn drive(inner: Arc<SchedulerInner>, first: String) {
    let mut task_id = first;

    loop {
        let outcome = match inner.options.task_timeout {
            Some(limit) => tokio::time::timeout(limit, inner.run_task(&task_id))
                .await
                .unwrap_or_else(|_| Err(CrawlError::Timeout(limit.as_secs()))),
            None => inner.run_task(&task_id).await,
        };

        match inner.finalize(&task_id, outcome).await {
            Some(next) => task_id = next,
            None => break,
        }
    }

    debug!("Scheduler idle");
    inner.idle.notify_waiters();
}

/// Callbacks for one running task
struct TaskHandler {
    inner: Arc<SchedulerInner>,
    task_id: String,
}

impl TaskHandler {
    fn build_record(&self, page: &PageData, html: crate::extract::HtmlData) -> PageRecord {
        let mut headers: Vec<Header> = page
            .headers
            .iter()
            .map(|h| Header {
                name: h.name.trim().to_lowercase(),
                value: h.value.trim().to_string(),
            })
            .collect();
        headers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.value.cmp(&b.value)));

        let header = |name: &str| {
            headers
                .iter()
                .find(|h| h.name == name && !h.value.is_empty())
                .map(|h| h.value.clone())
        };
        let tx_id = header(RESOLVED_ID_HEADER);
        let data_id = header(DATA_ID_HEADER);

        let (mut relative_urls, mut absolute_urls) = split_links(&page.found_urls);
        relative_urls.sort();
        relative_urls.dedup();
        absolute_urls.sort();
        absolute_urls.dedup();

        let identity = &page.request.wayfinder_url;
        PageRecord {
            html,
            tx_id,
            data_id,
            arns_name: identity.name().trim().to_lowercase(),
            wayfinder_url: identity.as_str().trim().to_lowercase(),
            gateway_url: page.request.gateway_url.as_str().trim().to_lowercase(),
            headers,
            relative_urls,
            absolute_urls,
        }
    }
}

#[async_trait]
impl CrawlHandler for TaskHandler {
    async fn on_page(&self, page: PageData) -> Result<PageVerdict> {
        let (pages, duplicates) = self.inner.sessions(&page.task_id)?;

        let html = self.inner.extractor.extract(&page.html)?;
        let text = html.text_without_tags();
        let check = duplicates.check(&text)?;

        if check.is_duplicate {
            self.inner
                .update_task(&self.task_id, |t| t.duplicate_count += 1)?;
            debug!(
                task_id = %self.task_id,
                wayfinder_url = %page.request.wayfinder_url,
                similarity = check.similarity,
                "Duplicate page discarded"
            );
            return Ok(PageVerdict::Duplicate);
        }

        let record = self.build_record(&page, html);
        if let Err(e) = pages.save(&record).await {
            // A retry must be checked afresh, unless the record is already stored
            if !matches!(e, StorageError::DuplicateKey(_)) {
                duplicates.forget(&text)?;
            }
            return Err(e.into());
        }
        self.inner.update_task(&self.task_id, |t| t.page_count += 1)?;

        debug!(
            task_id = %self.task_id,
            wayfinder_url = %page.request.wayfinder_url,
            similarity = check.similarity,
            "Page stored"
        );
        Ok(PageVerdict::Stored)
    }

    async fn on_scrape_error(&self, failure: ScrapeFailure) -> Result<GatewayUrl> {
        let replacement = self.inner.resolver.failover(&failure.failed_url).await?;

        warn!(
            task_id = %self.task_id,
            failed_url = %failure.failed_url,
            gateway_url = %replacement,
            retry = failure.retry_count + 1,
            max_retries = failure.max_retries,
            errors = ?failure.error_messages,
            "Retrying on another gateway"
        );
        Ok(replacement)
    }

    async fn on_resolve_url(&self, address: GatewayUrl) -> Result<CrawlRequest> {
        let (gateway_url, wayfinder_url) = self.inner.resolver.canonicalize(&address).await?;
        Ok(CrawlRequest::new(gateway_url, wayfinder_url))
    }
}
