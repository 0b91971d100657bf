//! Crawl task definitions and lifecycle

use crate::url::ArnsName;
use crate::{CrawlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_similarity_threshold() -> f64 {
    0.9
}

fn default_max_depth() -> u32 {
    10
}

fn default_max_pages() -> u32 {
    1000
}

/// What a task should crawl and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    /// ArNS names to seed the crawl from
    pub arns_names: Vec<String>,

    /// Render pages in a script-executing engine
    #[serde(default)]
    pub execute_javascript: bool,

    /// Follow `#/route` style links as distinct pages
    #[serde(default)]
    pub extract_hash_urls: bool,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl TaskConfig {
    pub fn new<I, S>(arns_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arns_names: arns_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Checks the config and returns it with names trimmed and deduplicated
    ///
    /// # Example
    ///
    /// ```
    /// use arns_crawler::TaskConfig;
    ///
    /// let config = TaskConfig::new([" ardrive", "ardrive", "arns"]).validate().unwrap();
    /// assert_eq!(config.arns_names, vec!["ardrive", "arns"]);
    ///
    /// let mut bad = TaskConfig::new(["ardrive"]);
    /// bad.similarity_threshold = 1.5;
    /// assert!(bad.validate().is_err());
    /// ```
    pub fn validate(mut self) -> Result<Self> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CrawlError::InvalidConfig(format!(
                "similarityThreshold must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }

        if self.max_pages == 0 {
            return Err(CrawlError::InvalidConfig(
                "maxPages must be greater than 0".to_string(),
            ));
        }

        let mut names: Vec<String> = Vec::with_capacity(self.arns_names.len());
        for raw in &self.arns_names {
            let name = ArnsName::parse(raw)
                .map_err(|e| CrawlError::InvalidConfig(e.to_string()))?;
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.into());
            }
        }

        if names.is_empty() {
            return Err(CrawlError::InvalidConfig(
                "arnsNames must contain at least one name".to_string(),
            ));
        }

        self.arns_names = names;
        Ok(self)
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            arns_names: Vec::new(),
            execute_javascript: false,
            extract_hash_urls: false,
            similarity_threshold: default_similarity_threshold(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
        }
    }
}

/// Lifecycle state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns true once no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Queued)
                | (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One crawl run and its results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTask {
    pub id: String,
    pub status: TaskStatus,
    #[serde(flatten)]
    pub config: TaskConfig,
    pub page_count: u32,
    pub duplicate_count: u32,
    /// Set exactly when the task failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlTask {
    pub fn new(id: impl Into<String>, config: TaskConfig) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Created,
            config,
            page_count: 0,
            duplicate_count: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Moves the task to `next`, stamping start and finish times
    pub fn advance(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            TaskStatus::Running => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed => self.finished_at = Some(Utc::now()),
            _ => {}
        }

        self.status = next;
        Ok(())
    }

    /// Ends the task as Completed, or Failed with `error`
    pub fn finish(&mut self, error: Option<String>) -> Result<()> {
        match error {
            Some(message) => {
                self.advance(TaskStatus::Failed)?;
                self.error = Some(message);
            }
            None => self.advance(TaskStatus::Completed)?,
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_json() {
        let config: TaskConfig = serde_json::from_str(r#"{"arnsNames": ["ardrive"]}"#).unwrap();
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.max_pages, 1000);
        assert!(!config.execute_javascript);
        assert!(!config.extract_hash_urls);
    }

    #[test]
    fn test_config_threshold_bounds() {
        for threshold in [0.0, 0.5, 1.0] {
            let mut config = TaskConfig::new(["a"]);
            config.similarity_threshold = threshold;
            assert!(config.validate().is_ok());
        }
        for threshold in [-0.1, 1.01, f64::NAN] {
            let mut config = TaskConfig::new(["a"]);
            config.similarity_threshold = threshold;
            assert!(matches!(
                config.validate(),
                Err(CrawlError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_config_rejects_bad_names() {
        assert!(TaskConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(TaskConfig::new(["has space"]).validate().is_err());
        assert!(TaskConfig::new(["ar://name"]).validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_pages() {
        let mut config = TaskConfig::new(["a"]);
        config.max_pages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifecycle() {
        let mut task = CrawlTask::new("t1", TaskConfig::new(["a"]));
        assert_eq!(task.status, TaskStatus::Created);

        task.advance(TaskStatus::Queued).unwrap();
        task.advance(TaskStatus::Running).unwrap();
        assert!(task.started_at.is_some());
        assert!(task.finished_at.is_none());

        task.finish(None).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.finished_at.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_failed_task_carries_error() {
        let mut task = CrawlTask::new("t1", TaskConfig::new(["a"]));
        task.advance(TaskStatus::Queued).unwrap();
        task.finish(Some("interrupted".to_string())).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("interrupted"));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut task = CrawlTask::new("t1", TaskConfig::new(["a"]));
        assert!(matches!(
            task.advance(TaskStatus::Running),
            Err(CrawlError::InvalidTransition {
                from: TaskStatus::Created,
                to: TaskStatus::Running
            })
        ));

        task.advance(TaskStatus::Queued).unwrap();
        task.advance(TaskStatus::Running).unwrap();
        task.finish(None).unwrap();
        assert!(task.advance(TaskStatus::Running).is_err());
        assert!(task.finish(Some("late".to_string())).is_err());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = CrawlTask::new("t1", TaskConfig::new(["ardrive"]));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["arnsNames"][0], "ardrive");
        assert_eq!(json["pageCount"], 0);
        assert!(json.get("createdAt").is_some());

        let back: CrawlTask = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }
}
