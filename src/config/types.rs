use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the crawler service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Task scheduler and storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Maximum number of tasks kept in the task table
    #[serde(rename = "max-tasks", default = "default_max_tasks")]
    pub max_tasks: usize,

    /// Overall per-task timeout in seconds, 0 disables it
    #[serde(rename = "task-timeout-secs", default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Root directory for task databases, exports and the task table
    #[serde(rename = "storage-path", default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Whether the task table is saved to and loaded from `tasks.json`
    #[serde(rename = "persist-tasks", default = "default_true")]
    pub persist_tasks: bool,

    /// Log filter used when no verbosity flag is given
    #[serde(rename = "log-level", default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_tasks: default_max_tasks(),
            task_timeout_secs: default_task_timeout_secs(),
            storage_path: default_storage_path(),
            persist_tasks: true,
            log_level: default_log_level(),
        }
    }
}

/// Where gateway hosts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Static,
    Network,
}

/// How a gateway is picked from the available list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    RoundRobin,
    Random,
}

/// Gateway resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Gateway base URLs for the static provider
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,

    #[serde(default = "default_selection")]
    pub selection: SelectionStrategy,

    /// Upper bound on dissolve/resolve rounds when looking for another gateway
    #[serde(rename = "max-failover-attempts", default = "default_max_failover_attempts")]
    pub max_failover_attempts: u32,

    /// Peer list endpoint for the network provider
    #[serde(rename = "network-url", default = "default_network_url")]
    pub network_url: String,

    /// How long a fetched peer list is reused
    #[serde(rename = "cache-ttl-secs", default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Host patterns that are never used as gateways
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gateways: default_gateways(),
            selection: default_selection(),
            max_failover_attempts: default_max_failover_attempts(),
            network_url: default_network_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            blocklist: Vec::new(),
        }
    }
}

/// HTML crawl engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent page fetches
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retries per request before the page is given up
    #[serde(rename = "max-request-retries", default = "default_max_request_retries")]
    pub max_request_retries: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_request_retries: default_max_request_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            respect_robots_txt: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

fn default_max_tasks() -> usize {
    100
}

fn default_task_timeout_secs() -> u64 {
    3600
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("storage")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_provider() -> ProviderKind {
    ProviderKind::Static
}

fn default_gateways() -> Vec<String> {
    vec!["https://ar.io".to_string()]
}

fn default_selection() -> SelectionStrategy {
    SelectionStrategy::RoundRobin
}

fn default_max_failover_attempts() -> u32 {
    10
}

fn default_network_url() -> String {
    "https://arweave.net/ar-io/peers".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_max_concurrency() -> usize {
    10
}

fn default_max_request_retries() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    5
}
