//! Crawl task service
//!
//! Tasks are submitted to a [`TaskScheduler`], which runs one at a time and
//! wires the resolver, extractor, deduplicator and storage into each run.

mod scheduler;
mod table;
mod task;

pub use scheduler::{
    SchedulerOptions, SchedulerParts, TaskScheduler, DATA_ID_HEADER, RESOLVED_ID_HEADER,
};
pub use table::{TaskTable, INTERRUPTED_ERROR};
pub use task::{CrawlTask, TaskConfig, TaskStatus};
