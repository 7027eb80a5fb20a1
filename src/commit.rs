//! Promotion of staged filter files
//!
//! Staged files are renamed over their canonical paths while the consumer is
//! paused. A failed rename keeps the entry's `pending_id` so the next commit
//! window retries it; repeating a rename that already happened is harmless
//! because the entry no longer lists it.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::observability::Metrics;
use crate::proxy::ProxyController;
use crate::registry::Registry;

/// Outcome of one commit window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub promoted: usize,
    pub failed: usize,
}

pub struct CommitManager {
    registry: Arc<Registry>,
    controller: Arc<dyn ProxyController>,
    metrics: Arc<Metrics>,
}

impl CommitManager {
    pub fn new(
        registry: Arc<Registry>,
        controller: Arc<dyn ProxyController>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            controller,
            metrics,
        }
    }

    /// Promote every staged file in one pause/resume window
    ///
    /// With nothing staged this returns immediately without touching the
    /// consumer. Otherwise `close` is called once, all renames are attempted,
    /// and `restart` is called once regardless of individual outcomes.
    pub async fn commit(&self) -> CommitReport {
        let staged = self.registry.staged().await;
        if staged.is_empty() {
            debug!("No staged filters to commit");
            return CommitReport::default();
        }

        if let Err(e) = self.controller.close().await {
            error!(error = %e, "Failed to stop consumer before commit");
        }

        let store = self.registry.store();
        let mut report = CommitReport::default();

        for (id, staged_id) in staged {
            if staged_id == id {
                self.registry.clear_pending(id, staged_id).await;
                continue;
            }

            match store.promote(staged_id, id).await {
                Ok(()) => {
                    if !self.registry.clear_pending(id, staged_id).await {
                        warn!(id, staged_id, "Filter changed during commit");
                    }
                    debug!(id, staged_id, "Promoted staged filter");
                    report.promoted += 1;
                }
                Err(e) => {
                    error!(
                        id,
                        staged_id,
                        path = %store.path_for(staged_id).display(),
                        error = %e,
                        "Failed to promote staged filter"
                    );
                    self.metrics.rename_failed();
                    report.failed += 1;
                }
            }
        }

        info!(
            promoted = report.promoted,
            failed = report.failed,
            "Filters were updated"
        );

        if let Err(e) = self.controller.restart().await {
            error!(error = %e, "Failed to restart consumer after commit");
        }
        self.metrics.commit_completed();

        report
    }
}
