//! arns-crawler command-line entry point

use anyhow::{bail, Context};
use arns_crawler::config::{load_config_with_hash, Config};
use arns_crawler::crawler::{build_http_client, HtmlCrawler};
use arns_crawler::dedup::SuperMinHashDeduplicator;
use arns_crawler::extract::HtmlExtractor;
use arns_crawler::output::{generate_markdown_summary, print_task_summary};
use arns_crawler::service::{SchedulerOptions, SchedulerParts, TaskTable};
use arns_crawler::storage::SqlitePageStorage;
use arns_crawler::{TaskConfig, TaskScheduler, WayfinderResolver};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// arns-crawler: a deduplicating crawler for ArNS content
///
/// Resolves ArNS names through ar.io gateways, crawls the pages each name
/// serves, drops near-duplicate pages and stores the rest per task.
#[derive(Parser, Debug)]
#[command(name = "arns-crawler")]
#[command(version)]
#[command(about = "A deduplicating crawler for ArNS content", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// ArNS name to crawl; repeat for several names in one task
    #[arg(short, long = "name", value_name = "NAME")]
    names: Vec<String>,

    /// JSON file with an array of task configs
    #[arg(long, value_name = "FILE")]
    task_file: Option<PathBuf>,

    /// Similarity at or above which a page counts as a duplicate
    #[arg(long, value_name = "T")]
    threshold: Option<f64>,

    /// Maximum link depth from the seed pages
    #[arg(long, value_name = "D")]
    max_depth: Option<u32>,

    /// Maximum number of pages per task
    #[arg(long, value_name = "P")]
    max_pages: Option<u32>,

    /// Render pages with a script-executing engine
    #[arg(long)]
    execute_javascript: bool,

    /// Treat `#/route` links as separate pages
    #[arg(long)]
    extract_hash_urls: bool,

    /// Write a markdown report of all tasks to FILE when done
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Print the saved task table and exit
    #[arg(long, conflicts_with = "dry_run")]
    list: bool,

    /// Validate config and tasks without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, &config.service.log_level);
    tracing::info!(
        path = %cli.config.display(),
        hash = %config_hash,
        "Configuration loaded"
    );

    let tasks = collect_tasks(&cli)?;

    if cli.dry_run {
        return handle_dry_run(&config, tasks);
    }

    if cli.list {
        return handle_list(&config);
    }

    let scheduler = build_scheduler(&config)?;

    if tasks.is_empty() {
        bail!("nothing to crawl: pass --name or --task-file");
    }

    for task in tasks {
        let created = scheduler.create(task)?;
        println!("Queued task {}", created.id);
    }

    scheduler.wait_idle().await;

    let all = scheduler.list();
    print_task_summary(&all);

    if let Some(path) = &cli.summary {
        generate_markdown_summary(&all, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Summary written");
    }

    Ok(())
}

/// Prints the saved task table as written, without claiming it
fn handle_list(config: &Config) -> anyhow::Result<()> {
    let options = SchedulerOptions::from_config(&config.service);
    let Some(path) = options.tasks_path else {
        bail!("task persistence is disabled; there is no saved task table to list");
    };

    let tasks = TaskTable::read_saved(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    print_task_summary(&tasks);
    Ok(())
}

/// Sets up the tracing subscriber from the verbosity flags or the config level
fn setup_logging(verbose: u8, quiet: bool, config_level: &str) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_new(format!("arns_crawler={},warn", config_level))
                .unwrap_or_else(|_| EnvFilter::new("arns_crawler=info,warn")),
            1 => EnvFilter::new("arns_crawler=debug,info"),
            2 => EnvFilter::new("arns_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn collect_tasks(cli: &Cli) -> anyhow::Result<Vec<TaskConfig>> {
    let mut tasks = match &cli.task_file {
        Some(path) => load_task_file(path)?,
        None => Vec::new(),
    };

    if !cli.names.is_empty() {
        tasks.push(TaskConfig::new(cli.names.iter().cloned()));
    }

    for task in &mut tasks {
        if let Some(threshold) = cli.threshold {
            task.similarity_threshold = threshold;
        }
        if let Some(max_depth) = cli.max_depth {
            task.max_depth = max_depth;
        }
        if let Some(max_pages) = cli.max_pages {
            task.max_pages = max_pages;
        }
        task.execute_javascript |= cli.execute_javascript;
        task.extract_hash_urls |= cli.extract_hash_urls;
    }

    Ok(tasks)
}

fn load_task_file(path: &Path) -> anyhow::Result<Vec<TaskConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid task file {}", path.display()))
}

fn build_scheduler(config: &Config) -> anyhow::Result<TaskScheduler> {
    let client = build_http_client(
        &config.user_agent,
        Duration::from_secs(config.crawler.request_timeout_secs),
    )?;

    let resolver = WayfinderResolver::from_config(&config.resolver, client)?;
    let engine = HtmlCrawler::new(&config.crawler, &config.user_agent)?;

    let parts = SchedulerParts {
        resolver: Arc::new(resolver),
        extractor: Arc::new(HtmlExtractor::new()),
        storage: Arc::new(SqlitePageStorage::new(&config.service.storage_path)),
        deduplicator: Arc::new(SuperMinHashDeduplicator::default()),
        engines: vec![Arc::new(engine)],
    };

    Ok(TaskScheduler::new(
        parts,
        SchedulerOptions::from_config(&config.service),
    )?)
}

/// Validates tasks and prints what would be crawled
fn handle_dry_run(config: &Config, tasks: Vec<TaskConfig>) -> anyhow::Result<()> {
    println!("=== arns-crawler Dry Run ===\n");

    println!("Resolver:");
    println!("  Provider: {:?}", config.resolver.provider);
    println!("  Selection: {:?}", config.resolver.selection);
    println!("  Gateways: {}", config.resolver.gateways.join(", "));
    println!("  Blocklist: {}", config.resolver.blocklist.join(", "));
    println!(
        "  Max failover attempts: {}",
        config.resolver.max_failover_attempts
    );

    println!("\nCrawler:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max request retries: {}", config.crawler.max_request_retries);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nStorage: {}", config.service.storage_path.display());

    println!("\nTasks ({}):", tasks.len());
    for task in tasks {
        let task = task.validate()?;
        println!(
            "  - {} (threshold {}, depth {}, pages {}, javascript {}, hash urls {})",
            task.arns_names.join(", "),
            task.similarity_threshold,
            task.max_depth,
            task.max_pages,
            task.execute_javascript,
            task.extract_hash_urls
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
