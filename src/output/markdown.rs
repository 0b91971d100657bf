//! Markdown task report

use crate::output::stats::{task_duration_secs, TaskStatistics};
use crate::service::CrawlTask;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report for `tasks` to `output_path`
pub fn generate_markdown_summary(tasks: &[CrawlTask], output_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(output_path)?;
    file.write_all(format_markdown_summary(tasks).as_bytes())?;
    Ok(())
}

/// Formats a task report as markdown
pub fn format_markdown_summary(tasks: &[CrawlTask]) -> String {
    let stats = TaskStatistics::from_tasks(tasks);
    let mut md = String::new();

    md.push_str("# ArNS Crawl Summary\n\n");

    md.push_str("## Overview\n\n");
    md.push_str(&format!("- **Tasks**: {}\n", stats.total_tasks));
    for (status, count) in &stats.tasks_by_status {
        md.push_str(&format!("  - {}: {}\n", status, count));
    }
    md.push_str(&format!("- **Pages stored**: {}\n", stats.pages_stored));
    md.push_str(&format!(
        "- **Duplicates discarded**: {} ({:.1}%)\n\n",
        stats.duplicates_discarded,
        stats.duplicate_ratio()
    ));

    md.push_str("## Tasks\n\n");
    md.push_str("| Task | Names | Status | Pages | Duplicates | Duration |\n");
    md.push_str("|------|-------|--------|-------|------------|----------|\n");
    for task in tasks {
        let duration = task_duration_secs(task)
            .map(|secs| format!("{}s", secs))
            .unwrap_or_else(|| "-".to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            task.id,
            task.config.arns_names.join(", "),
            task.status,
            task.page_count,
            task.duplicate_count,
            duration
        ));
    }

    let failed: Vec<&CrawlTask> = tasks.iter().filter(|t| t.error.is_some()).collect();
    if !failed.is_empty() {
        md.push_str("\n## Errors\n\n");
        for task in failed {
            md.push_str(&format!(
                "- `{}`: {}\n",
                task.id,
                task.error.as_deref().unwrap_or_default()
            ));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{TaskConfig, TaskStatus};
    use tempfile::TempDir;

    fn task(id: &str, error: Option<&str>) -> CrawlTask {
        let mut task = CrawlTask::new(id, TaskConfig::new(["ardrive", "arns"]));
        task.advance(TaskStatus::Queued).unwrap();
        task.advance(TaskStatus::Running).unwrap();
        task.page_count = 4;
        task.finish(error.map(str::to_string)).unwrap();
        task
    }

    #[test]
    fn test_format_markdown() {
        let md = format_markdown_summary(&[task("a", None), task("b", Some("timed out"))]);

        assert!(md.starts_with("# ArNS Crawl Summary"));
        assert!(md.contains("| a | ardrive, arns | completed | 4 | 0 |"));
        assert!(md.contains("## Errors"));
        assert!(md.contains("- `b`: timed out"));
    }

    #[test]
    fn test_no_error_section_when_all_succeed() {
        let md = format_markdown_summary(&[task("a", None)]);
        assert!(!md.contains("## Errors"));
    }

    #[test]
    fn test_generate_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("summary.md");

        generate_markdown_summary(&[task("a", None)], &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("| a |"));
    }
}
