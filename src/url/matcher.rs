use crate::{ConfigError, ConfigResult};
use std::fmt;

/// Checks if a gateway host matches a wildcard pattern
///
/// `"arweave.net"` matches only itself. `"*.arweave.net"` matches the bare
/// host and every host below it, so a blocklist entry also covers the
/// per-name subdomains a gateway serves.
///
/// # Examples
///
/// ```
/// use arns_crawler::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.bad-gateway.io", "bad-gateway.io"));
/// assert!(matches_wildcard("*.bad-gateway.io", "name.bad-gateway.io"));
/// assert!(!matches_wildcard("*.bad-gateway.io", "notbad-gateway.io"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// A validated, lower-cased host pattern used by the gateway blocklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern(String);

impl HostPattern {
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let pattern = raw.trim().to_lowercase();
        let host = pattern.strip_prefix("*.").unwrap_or(&pattern);

        if host.is_empty() {
            return Err(ConfigError::InvalidPattern(format!(
                "host pattern cannot be empty: '{}'",
                raw
            )));
        }

        if !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ConfigError::InvalidPattern(format!(
                "host pattern '{}' contains invalid characters",
                raw
            )));
        }

        if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
            return Err(ConfigError::InvalidPattern(format!(
                "host pattern '{}' has an empty label",
                raw
            )));
        }

        Ok(Self(pattern))
    }

    /// Matches a host, ignoring case
    pub fn matches(&self, host: &str) -> bool {
        matches_wildcard(&self.0, &host.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
