use crate::{UrlError, UrlResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Scheme of gateway-independent content identities
pub const IDENTITY_SCHEME: &str = "ar";

const IDENTITY_PREFIX: &str = "ar://";

/// An ArNS name, the leading host label of every gateway address
///
/// Names are trimmed and must consist of ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArnsName(String);

impl ArnsName {
    /// Parses and validates an ArNS name
    ///
    /// # Examples
    ///
    /// ```
    /// use arns_crawler::url::ArnsName;
    ///
    /// assert_eq!(ArnsName::parse(" ardrive ").unwrap().as_str(), "ardrive");
    /// assert!(ArnsName::parse("not a name").is_err());
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let name = raw.trim();

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(UrlError::InvalidName(raw.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArnsName {
    type Error = UrlError;

    fn try_from(value: String) -> UrlResult<Self> {
        Self::parse(&value)
    }
}

impl From<ArnsName> for String {
    fn from(name: ArnsName) -> Self {
        name.0
    }
}

impl fmt::Display for ArnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gateway-independent identity of a document: `ar://<name>[/path]`
///
/// This is the frontier's uniqueness key. Two gateway addresses that serve
/// the same name and path always dissolve to the same `WayfinderUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WayfinderUrl(String);

impl WayfinderUrl {
    /// Parses an identity string of the form `ar://<name>[/path]`
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let trimmed = raw.trim();
        let rest = trimmed
            .strip_prefix(IDENTITY_PREFIX)
            .ok_or_else(|| UrlError::InvalidScheme(trimmed.to_string()))?;

        let name_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        ArnsName::parse(&rest[..name_end])?;

        Ok(Self(trimmed.to_string()))
    }

    /// Builds the identity of a name's root document
    pub fn for_name(name: &ArnsName) -> Self {
        Self(format!("{}{}/", IDENTITY_PREFIX, name))
    }

    /// Builds an identity from a name and a path (with optional query/fragment)
    pub(crate) fn from_parts(name: &str, path: &str) -> Self {
        Self(format!("{}{}{}", IDENTITY_PREFIX, name, path))
    }

    /// The ArNS name this identity refers to
    pub fn name(&self) -> &str {
        let rest = &self.0[IDENTITY_PREFIX.len()..];
        let name_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        &rest[..name_end]
    }

    /// Everything after the name: path, query and fragment
    pub fn path(&self) -> &str {
        let rest = &self.0[IDENTITY_PREFIX.len()..];
        let name_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        &rest[name_end..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WayfinderUrl {
    type Error = UrlError;

    fn try_from(value: String) -> UrlResult<Self> {
        Self::parse(&value)
    }
}

impl From<WayfinderUrl> for String {
    fn from(url: WayfinderUrl) -> Self {
        url.0
    }
}

impl fmt::Display for WayfinderUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetchable mirror of a document: `https://<name>.<gateway-host>[/path]`
///
/// The host must be a domain with at least three labels (the name plus a
/// gateway host of two or more labels) and an alphabetic top-level label.
/// Only the name label may contain `_`.
/// Plain `http` is accepted so local gateways can be addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GatewayUrl(Url);

impl GatewayUrl {
    /// Parses and validates a gateway address
    ///
    /// # Examples
    ///
    /// ```
    /// use arns_crawler::url::GatewayUrl;
    ///
    /// let url = GatewayUrl::parse("https://ardrive.arweave.net/docs").unwrap();
    /// assert_eq!(url.name(), "ardrive");
    /// assert_eq!(url.gateway_host(), "arweave.net");
    ///
    /// // A bare gateway is not a mirror of any name
    /// assert!(GatewayUrl::parse("https://arweave.net/").is_err());
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(url)
    }

    /// Validates an already parsed URL as a gateway address
    pub fn from_url(url: Url) -> UrlResult<Self> {
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(url::Host::Domain(host)) => host.to_string(),
            Some(_) => {
                return Err(UrlError::Malformed(format!(
                    "gateway address must use a domain host: {}",
                    url
                )))
            }
            None => return Err(UrlError::MissingDomain),
        };

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 3 {
            return Err(UrlError::Malformed(format!(
                "gateway address needs a name and a gateway host: {}",
                url
            )));
        }

        // The leading label is an ArNS name, which may also carry `_`
        let labels_valid = labels.iter().enumerate().all(|(index, label)| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || (index == 0 && c == '_'))
        });
        let tld_valid = labels
            .last()
            .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or(false);

        if !labels_valid || !tld_valid {
            return Err(UrlError::Malformed(format!("invalid gateway host: {}", host)));
        }

        Ok(Self(url))
    }

    /// The leading host label, which is the ArNS name
    pub fn name(&self) -> &str {
        let host = self.0.host_str().unwrap_or_default();
        host.split('.').next().unwrap_or_default()
    }

    /// The host without the leading name label
    pub fn gateway_host(&self) -> &str {
        let host = self.0.host_str().unwrap_or_default();
        host.split_once('.').map(|(_, rest)| rest).unwrap_or_default()
    }

    /// Path plus query and fragment, always starting with `/`
    pub fn path_and_rest(&self) -> String {
        let mut out = self.0.path().to_string();
        if let Some(query) = self.0.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = self.0.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for GatewayUrl {
    type Error = UrlError;

    fn try_from(value: String) -> UrlResult<Self> {
        Self::parse(&value)
    }
}

impl From<GatewayUrl> for String {
    fn from(url: GatewayUrl) -> Self {
        url.0.into()
    }
}

impl fmt::Display for GatewayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
