//! Gateway resolution for ArNS names
//!
//! A [`WayfinderUrl`] names a document independently of any gateway; a
//! [`GatewayUrl`] is one mirror currently serving it. This module turns one
//! into the other and finds a different mirror when one fails.

mod providers;
mod wayfinder;

pub use providers::{
    build_provider, BlocklistGatewaysProvider, CachedGatewaysProvider, GatewaySelector,
    GatewaysProvider, NetworkGatewaysProvider, StaticGatewaysProvider,
};
pub use wayfinder::WayfinderResolver;

use crate::url::{GatewayUrl, WayfinderUrl};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Default bound on dissolve/resolve rounds during failover
pub const DEFAULT_MAX_FAILOVER_ATTEMPTS: u32 = 10;

/// Translation between content identities and gateway addresses
#[async_trait]
pub trait ArnsResolver: Send + Sync {
    /// Resolves a bare ArNS name or an `ar://` identity to a gateway address
    async fn resolve(&self, identifier: &str) -> Result<GatewayUrl>;

    /// Maps a gateway address back to its identity. Pure, no I/O.
    fn dissolve(&self, address: &GatewayUrl) -> WayfinderUrl;

    fn max_failover_attempts(&self) -> u32 {
        DEFAULT_MAX_FAILOVER_ATTEMPTS
    }

    /// Dissolves and re-resolves an address, returning the canonical pair
    async fn canonicalize(&self, address: &GatewayUrl) -> Result<(GatewayUrl, WayfinderUrl)> {
        let identity = self.dissolve(address);
        let resolved = self.resolve(identity.as_str()).await?;
        Ok((resolved, identity))
    }

    /// Finds a gateway address for the same document that differs from `failed`
    ///
    /// Fails with [`CrawlError::NoAlternateGateway`] when every round within
    /// the attempt bound lands on the failed address again.
    async fn failover(&self, failed: &GatewayUrl) -> Result<GatewayUrl> {
        let identity = self.dissolve(failed);
        let attempts = self.max_failover_attempts();

        for attempt in 1..=attempts {
            let candidate = self.resolve(identity.as_str()).await?;
            if &candidate != failed {
                debug!(
                    failed = %failed,
                    replacement = %candidate,
                    attempt,
                    "Found alternate gateway"
                );
                return Ok(candidate);
            }
        }

        Err(CrawlError::NoAlternateGateway {
            address: failed.to_string(),
            attempts,
        })
    }
}
