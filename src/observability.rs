//! Refresh and commit counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the scheduler, commit manager and status endpoints
#[derive(Debug, Default)]
pub struct Metrics {
    refreshes_succeeded: AtomicU64,
    refreshes_failed: AtomicU64,
    commits: AtomicU64,
    renames_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_succeeded(&self) {
        self.refreshes_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "refreshes_succeeded", "Metric incremented");
    }

    pub fn refresh_failed(&self) {
        self.refreshes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "refreshes_failed", "Metric incremented");
    }

    pub fn commit_completed(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "commits", "Metric incremented");
    }

    pub fn rename_failed(&self) {
        self.renames_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "renames_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            renames_failed: self.renames_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub commits: u64,
    pub renames_failed: u64,
}
