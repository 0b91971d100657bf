//! Integration tests for the task scheduler
//!
//! These run full tasks through the scheduler: wiremock servers stand in
//! for gateways, pages go through the real extractor and deduplicator, and
//! records land in SQLite databases under a temporary directory.

use arns_crawler::config::{CrawlerConfig, SelectionStrategy, UserAgentConfig};
use arns_crawler::crawler::{CrawlRun, CrawlSummary, HtmlCrawler, PageData};
use arns_crawler::dedup::SuperMinHashDeduplicator;
use arns_crawler::extract::HtmlExtractor;
use arns_crawler::resolver::StaticGatewaysProvider;
use arns_crawler::service::{SchedulerOptions, SchedulerParts};
use arns_crawler::storage::SqlitePageStorage;
use arns_crawler::{
    CrawlEngine, CrawlError, CrawlerKind, TaskConfig, TaskScheduler, TaskStatus,
    WayfinderResolver,
};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        max_concurrency: 2,
        max_request_retries: 3,
        request_timeout_secs: 5,
        respect_robots_txt: false,
    }
}

/// Builds an HTML engine whose client sends every `host` to `addr`
fn html_engine(routes: &[(&str, SocketAddr)]) -> HtmlCrawler {
    let client = routes
        .iter()
        .fold(reqwest::Client::builder(), |builder, (host, addr)| {
            builder.resolve(host, *addr)
        })
        .build()
        .unwrap();
    HtmlCrawler::with_client(client, &crawler_config(), &user_agent())
}

fn resolver(gateways: &[String]) -> WayfinderResolver {
    let provider = StaticGatewaysProvider::from_strings(gateways).unwrap();
    WayfinderResolver::new(Arc::new(provider), SelectionStrategy::RoundRobin)
}

fn scheduler(
    temp_dir: &TempDir,
    resolver: WayfinderResolver,
    engine: Arc<dyn CrawlEngine>,
    options: SchedulerOptions,
) -> TaskScheduler {
    TaskScheduler::new(
        SchedulerParts {
            resolver: Arc::new(resolver),
            extractor: Arc::new(HtmlExtractor::new()),
            storage: Arc::new(SqlitePageStorage::new(temp_dir.path())),
            deduplicator: Arc::new(SuperMinHashDeduplicator::default()),
            engines: vec![engine],
        },
        options,
    )
    .unwrap()
}

async fn mount_html(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .insert_header("x-arns-resolved-id", "TxAbc")
                .set_body_string(body.to_string()),
        )
        .mount(server)
        .await;
}

fn article(words: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><p>{}</p></body></html>",
        words, words
    )
}

#[tokio::test]
async fn test_duplicate_pages_are_counted_not_stored() {
    let server = MockServer::start().await;
    let port = server.address().port();

    mount_html(
        &server,
        "/",
        r#"<html><body><h1>index of the site</h1>
            <a href="/a">a</a><a href="/b">b</a>
            <a href="/c">c</a><a href="/d">d</a>
        </body></html>"#,
    )
    .await;
    let first = article("apples bananas cherries dates elderberries figs grapes");
    let second = article("mercury venus earth mars jupiter saturn uranus neptune");
    mount_html(&server, "/a", &first).await;
    mount_html(&server, "/b", &second).await;
    mount_html(&server, "/c", &first).await;
    mount_html(&server, "/d", &second).await;

    let temp_dir = TempDir::new().unwrap();
    let engine = html_engine(&[("example.gateway.test", *server.address())]);
    let scheduler = scheduler(
        &temp_dir,
        resolver(&[format!("http://gateway.test:{}", port)]),
        Arc::new(engine),
        SchedulerOptions::default(),
    );

    let mut config = TaskConfig::new(["example"]);
    config.similarity_threshold = 0.85;
    config.max_pages = 5;
    let created = scheduler.create(config).unwrap();

    scheduler.wait_idle().await;

    let task = scheduler.get(&created.id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.page_count, 3);
    assert_eq!(task.duplicate_count, 2);
    assert!(task.error.is_none());
    assert!(task.finished_at.is_some());

    let exports = temp_dir.path().join("exports");
    let details =
        std::fs::read_to_string(exports.join(format!("{}-details.jsonl", created.id))).unwrap();
    let html = std::fs::read_to_string(exports.join(format!("{}-html.jsonl", created.id))).unwrap();
    assert_eq!(details.lines().count(), 3);
    assert_eq!(html.lines().count(), 3);

    let mut identities: Vec<String> = details
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["txId"], "TxAbc");
            assert_eq!(value["arnsName"], "example");
            value["wayfinderUrl"].as_str().unwrap().to_string()
        })
        .collect();
    identities.sort();
    assert_eq!(identities[0], "ar://example/");
}

/// Records when each run starts and ends
struct SlowEngine {
    log: Arc<Mutex<Vec<(String, &'static str)>>>,
}

#[async_trait]
impl CrawlEngine for SlowEngine {
    fn kind(&self) -> CrawlerKind {
        CrawlerKind::Html
    }

    async fn start(&self, run: CrawlRun) -> arns_crawler::Result<CrawlSummary> {
        self.log.lock().unwrap().push((run.task_id.clone(), "start"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.log.lock().unwrap().push((run.task_id.clone(), "end"));
        Ok(CrawlSummary::default())
    }
}

#[tokio::test]
async fn test_tasks_run_one_at_a_time() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let scheduler = scheduler(
        &temp_dir,
        resolver(&["https://arweave.net".to_string()]),
        Arc::new(SlowEngine {
            log: Arc::clone(&log),
        }),
        SchedulerOptions::default(),
    );

    let first = scheduler.create(TaskConfig::new(["first"])).unwrap();
    let second = scheduler.create(TaskConfig::new(["second"])).unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(scheduler.get(&second.id).unwrap().status, TaskStatus::Queued);
    assert!(!scheduler.is_idle());

    scheduler.wait_idle().await;

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            (first.id.clone(), "start"),
            (first.id.clone(), "end"),
            (second.id.clone(), "start"),
            (second.id.clone(), "end"),
        ]
    );

    let tasks = scheduler.list();
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
    let first = scheduler.get(&first.id).unwrap();
    let second = scheduler.get(&second.id).unwrap();
    assert!(second.started_at.unwrap() >= first.finished_at.unwrap());
}

#[tokio::test]
async fn test_invalid_threshold_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let scheduler = scheduler(
        &temp_dir,
        resolver(&["https://arweave.net".to_string()]),
        Arc::new(SlowEngine {
            log: Arc::new(Mutex::new(Vec::new())),
        }),
        SchedulerOptions::default(),
    );

    let mut config = TaskConfig::new(["example"]);
    config.similarity_threshold = -0.5;

    assert!(matches!(
        scheduler.create(config),
        Err(CrawlError::InvalidConfig(_))
    ));
    assert!(scheduler.list().is_empty());
    assert!(scheduler.is_idle());
}

#[tokio::test]
async fn test_failed_gateway_is_replaced() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;

    let healthy = MockServer::start().await;
    mount_html(&healthy, "/", &article("served by the healthy gateway")).await;

    let temp_dir = TempDir::new().unwrap();
    let engine = html_engine(&[
        ("example.broken.test", *broken.address()),
        ("example.healthy.test", *healthy.address()),
    ]);
    let scheduler = scheduler(
        &temp_dir,
        resolver(&[
            format!("http://broken.test:{}", broken.address().port()),
            format!("http://healthy.test:{}", healthy.address().port()),
        ]),
        Arc::new(engine),
        SchedulerOptions::default(),
    );

    let created = scheduler.create(TaskConfig::new(["example"])).unwrap();
    scheduler.wait_idle().await;

    let task = scheduler.get(&created.id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.page_count, 1);
    assert!(!broken.received_requests().await.unwrap().is_empty());
    assert!(!healthy.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unresolvable_seed_fails_task() {
    let temp_dir = TempDir::new().unwrap();
    let scheduler = scheduler(
        &temp_dir,
        resolver(&[]),
        Arc::new(SlowEngine {
            log: Arc::new(Mutex::new(Vec::new())),
        }),
        SchedulerOptions::default(),
    );

    let created = scheduler.create(TaskConfig::new(["example"])).unwrap();
    scheduler.wait_idle().await;

    let task = scheduler.get(&created.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("no gateway"));
    assert_eq!(task.page_count, 0);
}

/// Serves a single page per run through the handler
struct OnePageEngine;

#[async_trait]
impl CrawlEngine for OnePageEngine {
    fn kind(&self) -> CrawlerKind {
        CrawlerKind::Html
    }

    async fn start(&self, run: CrawlRun) -> arns_crawler::Result<CrawlSummary> {
        let request = run.seeds[0].clone();
        run.handler
            .on_page(PageData {
                task_id: run.task_id.clone(),
                request,
                html: article(&format!("page for task {}", run.task_id)),
                headers: Vec::new(),
                found_urls: Vec::new(),
            })
            .await?;
        Ok(CrawlSummary {
            handled: 1,
            ..CrawlSummary::default()
        })
    }
}

#[tokio::test]
async fn test_finished_tasks_evicted_oldest_first() {
    let temp_dir = TempDir::new().unwrap();
    let scheduler = scheduler(
        &temp_dir,
        resolver(&["https://arweave.net".to_string()]),
        Arc::new(OnePageEngine),
        SchedulerOptions {
            max_tasks: 2,
            ..SchedulerOptions::default()
        },
    );

    let mut ids = Vec::new();
    for name in ["one", "two", "three"] {
        ids.push(scheduler.create(TaskConfig::new([name])).unwrap().id);
        scheduler.wait_idle().await;
    }

    let listed: Vec<String> = scheduler.list().into_iter().map(|t| t.id).collect();
    assert_eq!(listed, vec![ids[1].clone(), ids[2].clone()]);
    assert!(matches!(
        scheduler.get(&ids[0]),
        Err(CrawlError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_task_table_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let options = SchedulerOptions {
        tasks_path: Some(temp_dir.path().join("tasks.json")),
        ..SchedulerOptions::default()
    };

    let id = {
        let scheduler = scheduler(
            &temp_dir,
            resolver(&["https://arweave.net".to_string()]),
            Arc::new(OnePageEngine),
            options.clone(),
        );
        let created = scheduler.create(TaskConfig::new(["ardrive"])).unwrap();
        scheduler.wait_idle().await;
        created.id
    };

    let restarted = scheduler(
        &temp_dir,
        resolver(&["https://arweave.net".to_string()]),
        Arc::new(OnePageEngine),
        options,
    );
    let task = restarted.get(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.page_count, 1);
    assert_eq!(task.config.arns_names, vec!["ardrive"]);
}

#[tokio::test]
async fn test_task_timeout_fails_task() {
    let temp_dir = TempDir::new().unwrap();
    let scheduler = scheduler(
        &temp_dir,
        resolver(&["https://arweave.net".to_string()]),
        Arc::new(SlowEngine {
            log: Arc::new(Mutex::new(Vec::new())),
        }),
        SchedulerOptions {
            task_timeout: Some(Duration::from_millis(20)),
            ..SchedulerOptions::default()
        },
    );

    let created = scheduler.create(TaskConfig::new(["example"])).unwrap();
    scheduler.wait_idle().await;

    let task = scheduler.get(&created.id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("timed out"));
}
