use super::providers::{build_provider, GatewaySelector, GatewaysProvider};
use super::{ArnsResolver, DEFAULT_MAX_FAILOVER_ATTEMPTS};
use crate::config::{ResolverConfig, SelectionStrategy};
use crate::url::{ArnsName, GatewayUrl, WayfinderUrl, IDENTITY_SCHEME};
use crate::{CrawlError, Result, UrlError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Resolves ArNS identities by prefixing the name to a gateway host
///
/// `ar://ardrive/docs` on gateway `https://arweave.net` becomes
/// `https://ardrive.arweave.net/docs`. The gateway's scheme and port are kept.
pub struct WayfinderResolver {
    provider: Arc<dyn GatewaysProvider>,
    selector: GatewaySelector,
    max_failover_attempts: u32,
}

impl WayfinderResolver {
    pub fn new(provider: Arc<dyn GatewaysProvider>, selection: SelectionStrategy) -> Self {
        Self {
            provider,
            selector: GatewaySelector::new(selection),
            max_failover_attempts: DEFAULT_MAX_FAILOVER_ATTEMPTS,
        }
    }

    pub fn with_max_failover_attempts(mut self, attempts: u32) -> Self {
        self.max_failover_attempts = attempts.max(1);
        self
    }

    pub fn from_config(config: &ResolverConfig, client: reqwest::Client) -> Result<Self> {
        let provider = build_provider(config, client)?;
        Ok(Self::new(provider, config.selection)
            .with_max_failover_attempts(config.max_failover_attempts))
    }

    fn split_identifier(identifier: &str) -> Result<(String, String)> {
        let identifier = identifier.trim();
        let unresolvable =
            |e: UrlError| CrawlError::ResolutionFailure(format!("{}: {}", identifier, e));

        if identifier.starts_with(&format!("{}://", IDENTITY_SCHEME)) {
            let identity = WayfinderUrl::parse(identifier).map_err(unresolvable)?;
            let path = match identity.path() {
                "" => "/".to_string(),
                path if path.starts_with('/') => path.to_string(),
                rest => format!("/{}", rest),
            };
            Ok((identity.name().to_lowercase(), path))
        } else {
            let name = ArnsName::parse(identifier).map_err(unresolvable)?;
            Ok((name.as_str().to_lowercase(), "/".to_string()))
        }
    }

    fn compose(gateway: &Url, name: &str, path: &str) -> Result<GatewayUrl> {
        let host = gateway.host_str().ok_or_else(|| {
            CrawlError::ResolutionFailure(format!("gateway without host: {}", gateway))
        })?;
        let port = gateway.port().map(|p| format!(":{}", p)).unwrap_or_default();

        let raw = format!("{}://{}.{}{}{}", gateway.scheme(), name, host, port, path);
        let url = Url::parse(&raw)
            .map_err(|e| CrawlError::ResolutionFailure(format!("{}: {}", raw, e)))?;

        GatewayUrl::from_url(url)
            .map_err(|e| CrawlError::ResolutionFailure(format!("{}: {}", raw, e)))
    }
}

#[async_trait]
impl ArnsResolver for WayfinderResolver {
    async fn resolve(&self, identifier: &str) -> Result<GatewayUrl> {
        let (name, path) = Self::split_identifier(identifier)?;

        let gateways = self.provider.gateways().await?;
        let gateway = self.selector.pick(&gateways).ok_or_else(|| {
            CrawlError::ResolutionFailure(format!("no gateway available for '{}'", identifier))
        })?;

        let resolved = Self::compose(gateway, &name, &path)?;
        trace!(identifier, resolved = %resolved, "Resolved identifier");
        Ok(resolved)
    }

    fn dissolve(&self, address: &GatewayUrl) -> WayfinderUrl {
        WayfinderUrl::from_parts(&address.name().to_lowercase(), &address.path_and_rest())
    }

    fn max_failover_attempts(&self) -> u32 {
        self.max_failover_attempts
    }
}
