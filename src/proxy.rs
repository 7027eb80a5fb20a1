//! Consumer collaborator contract
//!
//! The service reading the canonical filter files is paused around a commit
//! and reloaded afterwards. Failures from either call are logged by the caller
//! and never abort a commit.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to stop consumer: {0}")]
    Close(String),

    #[error("failed to restart consumer: {0}")]
    Restart(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Pause/resume hooks of the component reading canonical filter files
#[async_trait]
pub trait ProxyController: Send + Sync {
    /// Stop reading and release file handles
    async fn close(&self) -> Result<()>;

    /// Reload from the canonical files
    async fn restart(&self) -> Result<()>;
}

/// Controller for running without an attached consumer
#[derive(Debug, Clone, Default)]
pub struct DetachedController;

impl DetachedController {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProxyController for DetachedController {
    async fn close(&self) -> Result<()> {
        tracing::info!("No consumer attached, skipping close");
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        tracing::info!("No consumer attached, skipping restart");
        Ok(())
    }
}
