//! HTTP fetcher for gateway pages
//!
//! Builds the shared client and turns a single GET into a [`FetchResult`]
//! the crawl loop can act on without inspecting reqwest errors itself.

use crate::config::UserAgentConfig;
use crate::storage::Header;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;

/// Maximum redirect hops followed by the client
pub const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: String,
        status_code: u16,
        content_type: String,
        /// Response headers with lower-cased names, in arrival order
        headers: Vec<Header>,
        body: String,
    },

    /// Page is not HTML
    ContentMismatch { content_type: String },

    /// Non-success HTTP status
    HttpError { status_code: u16 },

    /// Connection refused, timeout, TLS failure or unreadable body
    NetworkError { error: String },
}

impl FetchResult {
    /// Whether another gateway might serve the page
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::HttpError { .. } | Self::NetworkError { .. })
    }

    /// Short description used in retry logs and failure reports
    pub fn describe(&self) -> String {
        match self {
            Self::Success { status_code, .. } => format!("HTTP {}", status_code),
            Self::ContentMismatch { content_type } => {
                format!("not an HTML page: '{}'", content_type)
            }
            Self::HttpError { status_code } => format!("HTTP {}", status_code),
            Self::NetworkError { error } => error.clone(),
        }
    }
}

/// Builds an HTTP client with the crawler's user agent
///
/// Gateways may be addressed over plain `http`, so unlike a public web
/// crawler the client does not enforce https.
///
/// # Example
///
/// ```no_run
/// use arns_crawler::config::UserAgentConfig;
/// use arns_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ArnsCrawler".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page and classifies the outcome
///
/// Only `text/html` responses (or ones with no content type at all) are
/// read; anything else is reported as a content mismatch without reading
/// the body.
pub async fn fetch_page(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.is_empty() && !content_type.to_lowercase().contains("text/html") {
        return FetchResult::ContentMismatch { content_type };
    }

    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| Header {
                name: name.as_str().to_lowercase(),
                value: value.trim().to_string(),
            })
        })
        .collect();

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            headers,
            body,
        },
        Err(e) => classify_error(e),
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    };

    FetchResult::NetworkError { error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn client() -> Client {
        build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config(), Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .insert_header("X-ArNS-Resolved-Id", "  AbC123  ")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let result = fetch_page(&client(), &format!("{}/page", server.uri())).await;

        match result {
            FetchResult::Success {
                status_code,
                headers,
                body,
                ..
            } => {
                assert_eq!(status_code, 200);
                assert!(body.contains("hi"));
                let tx = headers
                    .iter()
                    .find(|h| h.name == "x-arns-resolved-id")
                    .unwrap();
                assert_eq!(tx.value, "AbC123");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_html_is_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8, 1, 2]),
            )
            .mount(&server)
            .await;

        let result = fetch_page(&client(), &server.uri()).await;
        assert!(matches!(result, FetchResult::ContentMismatch { .. }));
        assert!(!result.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = fetch_page(&client(), &server.uri()).await;
        assert!(matches!(result, FetchResult::HttpError { status_code: 503 }));
        assert!(result.is_retryable());
        assert_eq!(result.describe(), "HTTP 503");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on port 9 locally
        let result = fetch_page(&client(), "http://127.0.0.1:9/").await;
        assert!(matches!(result, FetchResult::NetworkError { .. }));
    }
}
