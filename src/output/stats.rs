//! Task statistics and console summary

use crate::service::{CrawlTask, TaskStatus};
use std::collections::BTreeMap;

/// Counters aggregated over a set of tasks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStatistics {
    pub total_tasks: usize,
    pub tasks_by_status: BTreeMap<String, usize>,
    pub pages_stored: u64,
    pub duplicates_discarded: u64,
}

impl TaskStatistics {
    pub fn from_tasks(tasks: &[CrawlTask]) -> Self {
        let mut stats = Self {
            total_tasks: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            *stats
                .tasks_by_status
                .entry(task.status.to_string())
                .or_insert(0) += 1;
            stats.pages_stored += u64::from(task.page_count);
            stats.duplicates_discarded += u64::from(task.duplicate_count);
        }

        stats
    }

    /// Share of received pages discarded as duplicates, in percent
    pub fn duplicate_ratio(&self) -> f64 {
        let seen = self.pages_stored + self.duplicates_discarded;
        if seen == 0 {
            0.0
        } else {
            self.duplicates_discarded as f64 / seen as f64 * 100.0
        }
    }
}

/// Seconds between start and finish, if both are known
pub fn task_duration_secs(task: &CrawlTask) -> Option<i64> {
    match (task.started_at, task.finished_at) {
        (Some(started), Some(finished)) => Some((finished - started).num_seconds()),
        _ => None,
    }
}

/// Formats one line per task followed by the totals
pub fn format_task_summary(tasks: &[CrawlTask]) -> String {
    let mut out = String::from("=== Crawl Tasks ===\n\n");

    for task in tasks {
        out.push_str(&format!(
            "{}  {:<9}  pages: {:<5} duplicates: {:<5} names: {}\n",
            task.id,
            task.status,
            task.page_count,
            task.duplicate_count,
            task.config.arns_names.join(", ")
        ));
        if let Some(secs) = task_duration_secs(task) {
            out.push_str(&format!("    took {}s\n", secs));
        }
        if task.status == TaskStatus::Failed {
            if let Some(error) = &task.error {
                out.push_str(&format!("    error: {}\n", error));
            }
        }
    }

    let stats = TaskStatistics::from_tasks(tasks);
    out.push_str(&format!("\nTasks: {}", stats.total_tasks));
    for (status, count) in &stats.tasks_by_status {
        out.push_str(&format!(", {} {}", count, status));
    }
    out.push('\n');
    out.push_str(&format!(
        "Pages stored: {}, duplicates discarded: {} ({:.1}%)\n",
        stats.pages_stored,
        stats.duplicates_discarded,
        stats.duplicate_ratio()
    ));

    out
}

/// Prints the task summary to stdout
pub fn print_task_summary(tasks: &[CrawlTask]) {
    print!("{}", format_task_summary(tasks));
}
