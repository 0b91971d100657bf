//! In-memory task table with bounded size and JSON persistence

use crate::service::{CrawlTask, TaskStatus};
use crate::{CrawlError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Error recorded on tasks that were active when the process stopped
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// Tasks in submission order plus the id of the one holding the run slot
#[derive(Debug)]
pub struct TaskTable {
    order: Vec<String>,
    tasks: HashMap<String, CrawlTask>,
    running: Option<String>,
    max_tasks: usize,
}

impl TaskTable {
    pub fn new(max_tasks: usize) -> Self {
        Self {
            order: Vec::new(),
            tasks: HashMap::new(),
            running: None,
            max_tasks: max_tasks.max(1),
        }
    }

    /// Builds a table from previously saved tasks
    ///
    /// Tasks that were still queued or running are marked Failed since their
    /// crawl state did not survive.
    pub fn from_tasks(tasks: Vec<CrawlTask>, max_tasks: usize) -> Self {
        let mut table = Self::new(max_tasks);

        for mut task in tasks {
            if matches!(task.status, TaskStatus::Queued | TaskStatus::Running) {
                if let Err(e) = task.finish(Some(INTERRUPTED_ERROR.to_string())) {
                    warn!(task_id = %task.id, error = %e, "Could not mark task interrupted");
                }
            }
            table.insert(task);
        }

        table
    }

    /// Reads saved tasks exactly as they were written
    ///
    /// A missing file reads as no tasks. Statuses are left untouched, so
    /// tasks another process is still running show as running.
    pub fn read_saved(path: &Path) -> Result<Vec<CrawlTask>> {
        if !path.exists() {
            debug!(path = %path.display(), "No saved task table");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CrawlError::InvalidConfig(format!("unreadable task table {}: {}", path.display(), e))
        })
    }

    /// Loads a saved table, or an empty one when the file does not exist
    pub fn load(path: &Path, max_tasks: usize) -> Result<Self> {
        let tasks = Self::read_saved(path)?;
        info!(path = %path.display(), tasks = tasks.len(), "Loaded task table");
        Ok(Self::from_tasks(tasks, max_tasks))
    }

    /// Writes tasks to `path` as a JSON array
    pub fn save(tasks: &[CrawlTask], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(tasks).map_err(|e| {
            CrawlError::StorageFailure(crate::storage::StorageError::Serialization(e))
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Adds a task, then evicts the oldest terminal tasks while over capacity
    pub fn insert(&mut self, task: CrawlTask) {
        let id = task.id.clone();
        if self.tasks.insert(id.clone(), task).is_none() {
            self.order.push(id);
        }
        self.evict();
    }

    fn evict(&mut self) {
        while self.order.len() > self.max_tasks {
            let oldest_terminal = self
                .order
                .iter()
                .position(|id| self.tasks.get(id).is_some_and(CrawlTask::is_terminal));

            match oldest_terminal {
                Some(index) => {
                    let id = self.order.remove(index);
                    self.tasks.remove(&id);
                    debug!(task_id = %id, "Evicted finished task");
                }
                None => {
                    warn!(
                        tasks = self.order.len(),
                        max_tasks = self.max_tasks,
                        "Task table over capacity with no finished tasks to evict"
                    );
                    break;
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&CrawlTask> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut CrawlTask> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| CrawlError::TaskNotFound(id.to_string()))
    }

    /// All tasks in submission order
    pub fn list(&self) -> Vec<CrawlTask> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .cloned()
            .collect()
    }

    /// First queued task in submission order, other than `exclude`
    pub fn next_queued(&self, exclude: &str) -> Option<String> {
        self.order
            .iter()
            .find(|id| {
                id.as_str() != exclude
                    && self
                        .tasks
                        .get(id.as_str())
                        .is_some_and(|t| t.status == TaskStatus::Queued)
            })
            .cloned()
    }

    pub fn running(&self) -> Option<&str> {
        self.running.as_deref()
    }

    pub fn set_running(&mut self, id: Option<String>) {
        self.running = id;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
