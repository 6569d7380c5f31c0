//! Feed fetching.
//!
//! [`FeedSource`] is the seam between the pipeline and the network. The
//! production implementation, [`HttpFeedSource`], issues one GET per fetch
//! and returns the raw body; it does not retry.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can return the current bytes of a calendar feed.
pub trait FeedSource: Send + Sync {
    /// Fetches the full feed document.
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, ProviderResult<Vec<u8>>>;
}

/// Settings for [`HttpFeedSource`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    pub user_agent: String,
}

impl FeedConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
            user_agent: format!("calwatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches feeds over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    config: FeedConfig,
}

impl HttpFeedSource {
    pub fn new(config: FeedConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("Failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        if !config.verify_tls {
            warn!("TLS certificate verification is disabled for feed requests");
        }

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn get(&self, url: &Url) -> ProviderResult<Vec<u8>> {
        check_scheme(url)?;
        debug!(feed = %url, "Fetching feed");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            ProviderError::network(format!("Request failed: {}", e))
                .with_feed(url.as_str())
                .with_source(e)
        })?;

        let body = handle_response(response)
            .await
            .map_err(|e| e.with_feed(url.as_str()))?;
        debug!(feed = %url, bytes = body.len(), "Fetched feed");
        Ok(body)
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, ProviderResult<Vec<u8>>> {
        Box::pin(self.get(url))
    }
}

fn check_scheme(url: &Url) -> ProviderResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ProviderError::configuration(format!(
            "Unsupported feed URL scheme '{}'",
            other
        ))
        .with_feed(url.as_str())),
    }
}

/// Maps the response status and extracts the body.
async fn handle_response(response: Response) -> ProviderResult<Vec<u8>> {
    let status = response.status();
    trace!(status = %status, "Received response");

    match status {
        s if s.is_success() => response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::network(format!("Failed to read response: {}", e))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::access_denied(
            format!("Access to feed denied ({})", status),
        )),
        StatusCode::NOT_FOUND => Err(ProviderError::not_found("Feed not found")),
        s if s.is_server_error() => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::server(format!("Server error ({}): {}", s, body)))
        }
        s => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %s, body = %body, "Unexpected response status");
            Err(ProviderError::invalid_response(format!(
                "Unexpected status {}: {}",
                s, body
            )))
        }
    }
}
