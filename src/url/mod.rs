//! URL handling for ArNS content
//!
//! This module provides the two address shapes the crawler works with, the
//! hash-fragment and relative/absolute link policies, and host pattern
//! matching for gateway blocklists.
//!
//! - `WayfinderUrl`: `ar://<name>[/path]`, the stable identity of a document
//! - `GatewayUrl`: `https://<name>.<gateway-host>[/path]`, one fetchable mirror

mod identity;
mod links;
mod matcher;

pub use identity::{ArnsName, GatewayUrl, WayfinderUrl, IDENTITY_SCHEME};
pub use links::{apply_hash_policy, is_relative, normalize_link, prefilter_candidate, split_links};
pub use matcher::{matches_wildcard, HostPattern};
