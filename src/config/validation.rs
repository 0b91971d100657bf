use crate::config::types::{
    Config, CrawlerConfig, ProviderKind, ResolverConfig, ServiceConfig, UserAgentConfig,
};
use crate::url::HostPattern;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_service_config(&config.service)?;
    validate_resolver_config(&config.resolver)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

fn validate_service_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.max_tasks < 1 {
        return Err(ConfigError::Validation(
            "max_tasks must be >= 1".to_string(),
        ));
    }

    if config.storage_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_resolver_config(config: &ResolverConfig) -> Result<(), ConfigError> {
    if config.max_failover_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_failover_attempts must be >= 1".to_string(),
        ));
    }

    match config.provider {
        ProviderKind::Static => {
            if config.gateways.is_empty() {
                return Err(ConfigError::Validation(
                    "static provider needs at least one gateway".to_string(),
                ));
            }
            for gateway in &config.gateways {
                validate_gateway_url(gateway)?;
            }
        }
        ProviderKind::Network => {
            let url = Url::parse(&config.network_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid network_url '{}': {}", config.network_url, e))
            })?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::InvalidUrl(format!(
                    "network_url '{}' must use http or https",
                    config.network_url
                )));
            }
        }
    }

    for pattern in &config.blocklist {
        HostPattern::parse(pattern)?;
    }

    Ok(())
}

/// A gateway is a bare HTTP(S) origin; names are prepended to its host
fn validate_gateway_url(gateway: &str) -> Result<(), ConfigError> {
    let url = Url::parse(gateway)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid gateway '{}': {}", gateway, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Gateway '{}' must use http or https",
            gateway
        )));
    }

    match url.host() {
        Some(url::Host::Domain(host)) if host.contains('.') => Ok(()),
        _ => Err(ConfigError::InvalidUrl(format!(
            "Gateway '{}' must have a domain host with at least two labels",
            gateway
        ))),
    }
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}
