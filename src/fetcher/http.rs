//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::warn;

use super::{Transport, TransportError, TransportResponse};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: concat!("filtersync/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy_url: None,
        }
    }
}

/// Transport performing plain GET requests
///
/// Timeouts live here; nothing above this layer adds its own deadline.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(url) = &config.proxy_url {
            let proxy = Proxy::all(url)
                .map_err(|e| TransportError(format!("invalid proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError(format!("timed out: {}", e))
            } else {
                TransportError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Failed to read response body");
            TransportError(format!("failed to read body: {}", e))
        })?;

        Ok(TransportResponse { status, body })
    }
}
