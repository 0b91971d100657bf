//! Task reports for the console and markdown files

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{format_task_summary, print_task_summary, TaskStatistics};
