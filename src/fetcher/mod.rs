//! Filter list retrieval
//!
//! The [`Fetcher`] performs exactly one GET per call through an injected
//! [`Transport`] and classifies failures. It never retries; a failed entry is
//! picked up again by the scheduler once its deadline passes.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub use http::{HttpConfig, HttpTransport};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("unexpected HTTP status {status} from {url}")]
    Protocol { url: String, status: u16 },
}

/// Failure of the transport call itself (connect, timeout, body read)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Raw response handed back by a transport
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// HTTP client abstraction used for every download
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Serializing downloader shared by `Registry::add` and the scheduler
///
/// The internal gate guarantees at most one download is in flight at any
/// instant, whoever initiated it.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    in_flight: Mutex<()>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(()),
        }
    }

    /// Download the raw body at `url`
    pub async fn download(&self, url: &str) -> Result<Bytes, FetchError> {
        let _gate = self.in_flight.lock().await;

        debug!(url, "Downloading filter");

        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::Protocol {
                url: url.to_string(),
                status: response.status,
            });
        }

        debug!(url, size = response.body.len(), "Download completed");

        Ok(response.body)
    }
}
