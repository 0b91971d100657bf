//! Per-origin robots.txt fetching and caching

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Rules for one origin plus when they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub rules: RobotsRules,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        Utc::now() - self.fetched_at > ttl
    }
}

/// Fetches `/robots.txt` once per origin and answers permission checks
///
/// Missing files (4xx) allow everything. Network failures and 5xx
/// responses also allow everything but are not cached, so the next request
/// to that origin tries again.
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            ttl: Duration::hours(24),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Checks whether `url` may be fetched, fetching its origin's rules if needed
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        if let Some(cached) = self.entries.read().await.get(&origin) {
            if !cached.is_stale(self.ttl) {
                return cached.rules.is_allowed(url.as_str(), &self.user_agent);
            }
        }

        match self.fetch(url).await {
            Some(rules) => {
                let allowed = rules.is_allowed(url.as_str(), &self.user_agent);
                self.entries
                    .write()
                    .await
                    .insert(origin, CachedRobots::new(rules));
                allowed
            }
            None => true,
        }
    }

    async fn fetch(&self, url: &Url) -> Option<RobotsRules> {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let response = match self.client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %robots_url, error = %e, "Failed to fetch robots.txt");
                return None;
            }
        };

        let status = response.status();
        if status.is_success() {
            match response.text().await {
                Ok(body) => {
                    debug!(url = %robots_url, "Fetched robots.txt");
                    Some(RobotsRules::from_content(&body))
                }
                Err(e) => {
                    warn!(url = %robots_url, error = %e, "Failed to read robots.txt");
                    None
                }
            }
        } else if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Some(RobotsRules::allow_all())
        } else {
            warn!(url = %robots_url, status = status.as_u16(), "Unexpected robots.txt status");
            None
        }
    }

    /// Number of cached origins
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_cached_robots_staleness() {
        let mut cached = CachedRobots::new(RobotsRules::allow_all());
        assert!(!cached.is_stale(Duration::hours(24)));

        cached.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cached.is_stale(Duration::hours(24)));
    }

    #[tokio::test]
    async fn test_fetches_and_applies_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot");
        let base = Url::parse(&server.uri()).unwrap();

        assert!(!cache.is_allowed(&base.join("/private/page").unwrap()).await);
        assert!(cache.is_allowed(&base.join("/public").unwrap()).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot");
        let url = Url::parse(&server.uri()).unwrap().join("/anything").unwrap();
        assert!(cache.is_allowed(&url).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(Client::new(), "TestBot");
        let url = Url::parse(&server.uri()).unwrap().join("/x").unwrap();
        assert!(cache.is_allowed(&url).await);
        assert!(cache.is_empty().await);
    }
}
