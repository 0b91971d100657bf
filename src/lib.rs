//! arns-crawler: a deduplicating crawler for ArNS content
//!
//! This crate crawls pages published under ArNS names. Names are resolved to
//! rotating HTTP gateways, every discovered link is canonicalized back to its
//! gateway-independent `ar://` identity, and near-duplicate pages are dropped
//! before the remaining ones are stored per crawl task.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod extract;
pub mod output;
pub mod resolver;
pub mod robots;
pub mod service;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid task configuration: {0}")]
    InvalidConfig(String),

    #[error("Resolution failure: {0}")]
    ResolutionFailure(String),

    #[error("No alternate gateway for {address} after {attempts} attempts")]
    NoAlternateGateway { address: String, attempts: u32 },

    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] storage::StorageError),

    #[error("Deduplication failure: {0}")]
    DeduplicationFailure(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition {
        from: service::TaskStatus,
        to: service::TaskStatus,
    },

    #[error("Task timed out after {0}s")]
    Timeout(u64),

    #[error("Crawl engine error: {0}")]
    CrawlEngine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// Identity and gateway address errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Invalid ArNS name: '{0}'")]
    InvalidName(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlHandler, CrawlRequest, CrawlerKind};
pub use dedup::{DuplicateCheck, PageDeduplicator};
pub use resolver::{ArnsResolver, WayfinderResolver};
pub use service::{CrawlTask, TaskConfig, TaskScheduler, TaskStatus};
pub use url::{ArnsName, GatewayUrl, WayfinderUrl};
