use thiserror::Error;

use crate::fetcher::FetchError;

/// Errors surfaced by registry operations and refresh cycles
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("filter with name '{name}' or url '{url}' already exists")]
    Duplicate { name: String, url: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {status} from {url}")]
    Protocol { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network { url, message } => {
                SyncError::Network(format!("{}: {}", url, message))
            }
            FetchError::Protocol { url, status } => SyncError::Protocol { url, status },
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
