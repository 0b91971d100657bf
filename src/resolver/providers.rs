use crate::config::{ProviderKind, ResolverConfig, SelectionStrategy};
use crate::url::HostPattern;
use crate::{ConfigError, CrawlError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Source of gateway base URLs
#[async_trait]
pub trait GatewaysProvider: Send + Sync {
    async fn gateways(&self) -> Result<Vec<Url>>;
}

/// A fixed list of gateways from configuration
#[derive(Debug, Clone)]
pub struct StaticGatewaysProvider {
    gateways: Vec<Url>,
}

impl StaticGatewaysProvider {
    pub fn new(gateways: Vec<Url>) -> Self {
        Self { gateways }
    }

    pub fn from_strings<S: AsRef<str>>(gateways: &[S]) -> Result<Self> {
        let parsed = gateways
            .iter()
            .map(|g| {
                Url::parse(g.as_ref()).map_err(|e| {
                    CrawlError::Config(ConfigError::InvalidUrl(format!(
                        "Invalid gateway '{}': {}",
                        g.as_ref(),
                        e
                    )))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsed))
    }
}

#[async_trait]
impl GatewaysProvider for StaticGatewaysProvider {
    async fn gateways(&self) -> Result<Vec<Url>> {
        Ok(self.gateways.clone())
    }
}

#[derive(Debug, Deserialize)]
struct PeerList {
    #[serde(default)]
    gateways: HashMap<String, PeerEntry>,
}

#[derive(Debug, Deserialize)]
struct PeerEntry {
    url: String,
}

/// Gateways discovered from an ar.io peer list endpoint
///
/// The endpoint returns `{"gateways": {"<address>": {"url": "https://..."}}}`.
/// Entries whose URL does not parse are skipped.
#[derive(Debug, Clone)]
pub struct NetworkGatewaysProvider {
    client: reqwest::Client,
    endpoint: Url,
}

impl NetworkGatewaysProvider {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl GatewaysProvider for NetworkGatewaysProvider {
    async fn gateways(&self) -> Result<Vec<Url>> {
        let peers: PeerList = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut gateways: Vec<Url> = peers
            .gateways
            .into_iter()
            .filter_map(|(address, entry)| match Url::parse(&entry.url) {
                Ok(url) => Some(url),
                Err(e) => {
                    debug!(peer = %address, url = %entry.url, error = %e, "Skipping peer");
                    None
                }
            })
            .collect();
        gateways.sort();
        gateways.dedup();

        info!(endpoint = %self.endpoint, count = gateways.len(), "Fetched gateway peers");
        Ok(gateways)
    }
}

/// Reuses another provider's list until it is older than `ttl`
pub struct CachedGatewaysProvider<P> {
    inner: P,
    ttl: Duration,
    cache: RwLock<Option<(Instant, Vec<Url>)>>,
}

impl<P: GatewaysProvider> CachedGatewaysProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<P: GatewaysProvider> GatewaysProvider for CachedGatewaysProvider<P> {
    async fn gateways(&self) -> Result<Vec<Url>> {
        if let Some((fetched_at, gateways)) = self.cache.read().await.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(gateways.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some((fetched_at, gateways)) = cache.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(gateways.clone());
            }
        }

        let gateways = self.inner.gateways().await?;
        *cache = Some((Instant::now(), gateways.clone()));
        Ok(gateways)
    }
}

/// Drops gateways whose host matches any blocklist pattern
pub struct BlocklistGatewaysProvider<P> {
    inner: P,
    blocklist: Vec<HostPattern>,
}

impl<P: GatewaysProvider> BlocklistGatewaysProvider<P> {
    pub fn new(inner: P, blocklist: Vec<HostPattern>) -> Self {
        Self { inner, blocklist }
    }

    fn is_blocked(&self, gateway: &Url) -> bool {
        let host = gateway.host_str().unwrap_or_default();
        self.blocklist.iter().any(|pattern| pattern.matches(host))
    }
}

#[async_trait]
impl<P: GatewaysProvider> GatewaysProvider for BlocklistGatewaysProvider<P> {
    async fn gateways(&self) -> Result<Vec<Url>> {
        let all = self.inner.gateways().await?;
        let total = all.len();
        let allowed: Vec<Url> = all.into_iter().filter(|g| !self.is_blocked(g)).collect();

        if allowed.len() < total {
            debug!(blocked = total - allowed.len(), "Filtered blocklisted gateways");
        }
        Ok(allowed)
    }
}

/// Picks one gateway per resolution
#[derive(Debug)]
pub struct GatewaySelector {
    strategy: SelectionStrategy,
    cursor: AtomicUsize,
}

impl GatewaySelector {
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn pick<'a>(&self, gateways: &'a [Url]) -> Option<&'a Url> {
        if gateways.is_empty() {
            return None;
        }

        match self.strategy {
            SelectionStrategy::RoundRobin => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % gateways.len();
                gateways.get(index)
            }
            SelectionStrategy::Random => gateways.choose(&mut rand::thread_rng()),
        }
    }
}

/// Builds the provider chain described by the resolver configuration
///
/// Network lists are always cached; a non-empty blocklist wraps either kind.
pub fn build_provider(
    config: &ResolverConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn GatewaysProvider>> {
    let blocklist = config
        .blocklist
        .iter()
        .map(|p| HostPattern::parse(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let provider: Arc<dyn GatewaysProvider> = match config.provider {
        ProviderKind::Static => {
            let inner = StaticGatewaysProvider::from_strings(&config.gateways)?;
            if blocklist.is_empty() {
                Arc::new(inner)
            } else {
                Arc::new(BlocklistGatewaysProvider::new(inner, blocklist))
            }
        }
        ProviderKind::Network => {
            let endpoint = Url::parse(&config.network_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid network_url: {}", e))
            })?;
            let cached = CachedGatewaysProvider::new(
                NetworkGatewaysProvider::new(client, endpoint),
                Duration::from_secs(config.cache_ttl_secs),
            );
            if blocklist.is_empty() {
                Arc::new(cached)
            } else {
                Arc::new(BlocklistGatewaysProvider::new(cached, blocklist))
            }
        }
    };

    if config.provider == ProviderKind::Static && config.gateways.len() < 2 {
        warn!("Only one static gateway configured, failover will not find an alternate");
    }

    Ok(provider)
}
