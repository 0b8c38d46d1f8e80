//! HTTP(S) strategy.

use super::decode::decode_blocking;
use super::{LoadFuture, LoadStrategy};
use crate::error::LoadError;
use crate::request::{Request, Source};
use crate::result::LoadedFrom;
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// User agent sent with image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("imgload/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 15;

/// Default number of retries for network loads.
pub const DEFAULT_NETWORK_RETRY_COUNT: u32 = 2;

/// Network strategy configuration.
#[derive(Debug, Clone)]
pub struct NetworkStrategyConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub retry_count: u32,
}

impl Default for NetworkStrategyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_count: DEFAULT_NETWORK_RETRY_COUNT,
        }
    }
}

/// Loads `http://` and `https://` sources with reqwest.
///
/// Retries only while connected, and supports replay once connectivity
/// returns.
#[derive(Debug, Clone)]
pub struct NetworkStrategy {
    client: reqwest::Client,
    retry_count: u32,
}

impl NetworkStrategy {
    pub fn new(config: NetworkStrategyConfig) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LoadError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.retry_count))
    }

    /// Uses an existing client, sharing its connection pool.
    pub fn with_client(client: reqwest::Client, retry_count: u32) -> Self {
        Self {
            client,
            retry_count,
        }
    }

    fn url(request: &Request) -> Option<&str> {
        match request.source() {
            Source::Uri(uri) if uri.starts_with("http://") || uri.starts_with("https://") => {
                Some(uri)
            }
            _ => None,
        }
    }

    fn cache_control(request: &Request) -> Option<HeaderValue> {
        let policy = request.network_policy();
        if !policy.should_read_from_cache() {
            Some(HeaderValue::from_static("no-cache"))
        } else if !policy.should_write_to_cache() {
            Some(HeaderValue::from_static("no-store"))
        } else {
            None
        }
    }

    async fn fetch(&self, request: &Request, url: &str) -> Result<bytes::Bytes, LoadError> {
        let mut builder = self.client.get(url);
        if let Some(value) = Self::cache_control(request) {
            builder = builder.header(CACHE_CONTROL, value);
        }

        trace!(url, "HTTP GET request starting");
        let response = builder.send().await.map_err(|e| {
            warn!(
                url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            LoadError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "HTTP error status");
            return Err(LoadError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Network(format!("Failed to read response: {}", e)))?;

        if body.is_empty() {
            return Err(LoadError::ContentLengthUnknown);
        }

        trace!(url, bytes = body.len(), "HTTP response body read");
        Ok(body)
    }
}

impl LoadStrategy for NetworkStrategy {
    fn name(&self) -> &str {
        "network"
    }

    fn can_handle(&self, request: &Request) -> bool {
        Self::url(request).is_some()
    }

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a> {
        Box::pin(async move {
            let url = Self::url(request)
                .ok_or_else(|| LoadError::NoStrategy(request.source().to_string()))?;

            // No response cache is kept, so offline-only requests cannot be served here
            if request.network_policy().is_offline_only() {
                return Err(LoadError::Offline);
            }

            let body = self.fetch(request, url).await?;
            decode_blocking(body, request, LoadedFrom::Network).await
        })
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn should_retry(&self, is_connected: bool) -> bool {
        is_connected
    }

    /// Client errors and undecodable bodies are permanent; another attempt
    /// would get the same answer.
    fn should_retry_error(&self, error: &LoadError) -> bool {
        match error {
            LoadError::Http { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            LoadError::Decode(_) | LoadError::Offline => false,
            _ => true,
        }
    }

    fn supports_replay(&self) -> bool {
        true
    }
}
