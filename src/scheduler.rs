//! Periodic filter refresh loop
//!
//! One pass of the loop:
//! 1. Select the next due entry (reserving its next deadline)
//! 2. Download, summarize and stage it to a freshly named file
//! 3. Repeat until nothing is due
//! 4. If anything was staged, commit all staged files in one window
//!
//! Then the loop sleeps for one period. Entries are refreshed strictly one
//! at a time.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commit::{CommitManager, CommitReport};
use crate::error::Result;
use crate::observability::Metrics;
use crate::parser;
use crate::registry::{FilterEntry, Registry, StageOutcome};

#[derive(Debug)]
enum State {
    Idle,
    Select,
    Refresh(FilterEntry),
    Commit,
}

/// Summary of one pass through the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub refreshed: usize,
    pub failed: usize,
    pub commit: Option<CommitReport>,
}

pub struct Scheduler {
    registry: Arc<Registry>,
    commit: CommitManager,
    metrics: Arc<Metrics>,
    enabled: bool,
    period: Duration,
    dirty: bool,
}

impl Scheduler {
    pub fn new(
        registry: Arc<Registry>,
        commit: CommitManager,
        metrics: Arc<Metrics>,
        enabled: bool,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            commit,
            metrics,
            enabled,
            period,
            dirty: false,
        }
    }

    /// Run the loop on a background task until `shutdown` flips or its sender drops
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            enabled = self.enabled,
            period_secs = self.period.as_secs(),
            "Filter scheduler started"
        );

        loop {
            if self.enabled {
                let report = self.run_cycle().await;
                debug!(
                    refreshed = report.refreshed,
                    failed = report.failed,
                    committed = report.commit.is_some(),
                    "Filter cycle finished"
                );
            } else {
                debug!("Filter updates disabled");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = shutdown.changed() => {
                    info!("Filter scheduler stopping");
                    return;
                }
            }
        }
    }

    /// Drive the state machine from Select until it reaches Idle
    ///
    /// Commit is entered once nothing is due and either something was staged
    /// in this pass or an earlier rename is still pending.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut state = State::Select;

        loop {
            state = match state {
                State::Select => match self.registry.select_due(Utc::now()).await {
                    Some(entry) => State::Refresh(entry),
                    None if self.dirty || self.registry.has_pending().await => State::Commit,
                    None => {
                        debug!("No filters were updated");
                        State::Idle
                    }
                },
                State::Refresh(entry) => {
                    match self.refresh(&entry).await {
                        Ok(()) => {
                            self.metrics.refresh_succeeded();
                            report.refreshed += 1;
                        }
                        Err(e) => {
                            warn!(id = entry.id, url = %entry.url, error = %e, "Filter refresh failed");
                            self.metrics.refresh_failed();
                            report.failed += 1;
                        }
                    }
                    State::Select
                }
                State::Commit => {
                    report.commit = Some(self.commit.commit().await);
                    self.dirty = false;
                    State::Idle
                }
                State::Idle => return report,
            };
        }
    }

    /// Download one entry into a new staged file and record it
    ///
    /// The canonical file is never written here.
    async fn refresh(&mut self, entry: &FilterEntry) -> Result<()> {
        let body = self.registry.fetcher().download(&entry.url).await?;
        let rule_count = parser::summarize(&body);

        let staged_id = self.registry.mint_id();
        let store = self.registry.store();
        store.write(staged_id, &body).await?;

        match self
            .registry
            .stage(entry.id, staged_id, rule_count, Utc::now())
            .await
        {
            StageOutcome::Staged { superseded } => {
                self.dirty = true;
                if let Some(old) = superseded.filter(|old| *old != entry.id) {
                    if let Err(e) = store.remove(old).await {
                        debug!(id = entry.id, staged_id = old, error = %e, "Failed to remove superseded staged file");
                    }
                }
                debug!(id = entry.id, staged_id, rule_count, "Staged filter update");
            }
            StageOutcome::Missing => {
                debug!(id = entry.id, "Filter removed during refresh, discarding download");
                if let Err(e) = store.remove(staged_id).await {
                    debug!(staged_id, error = %e, "Failed to remove orphaned staged file");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::testing::{RecordingController, ScriptedTransport, registry_in};
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        transport: Arc<ScriptedTransport>,
        controller: Arc<RecordingController>,
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
    }

    impl Fixture {
        /// Two enabled filters (ids 1 and 2) with canonical content on disk, both due
        async fn new(transport: ScriptedTransport) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let transport = Arc::new(transport);
            let controller = Arc::new(RecordingController::sharing(transport.log()));
            let registry = registry_in(temp_dir.path(), transport.clone());

            // loaded before the files exist, so both deadlines sit at the epoch
            registry
                .load(&[
                    FilterConfig::new(1, true, "a", "http://lists/a"),
                    FilterConfig::new(2, true, "b", "http://lists/b"),
                ])
                .await;
            std::fs::write(temp_dir.path().join("1.txt"), "old-a\n").unwrap();
            std::fs::write(temp_dir.path().join("2.txt"), "old-b\n").unwrap();

            Self {
                temp_dir,
                transport,
                controller,
                registry,
                metrics: Arc::new(Metrics::new()),
            }
        }

        fn scheduler(&self, enabled: bool, period: Duration) -> Scheduler {
            let commit = CommitManager::new(
                self.registry.clone(),
                self.controller.clone(),
                self.metrics.clone(),
            );
            Scheduler::new(self.registry.clone(), commit, self.metrics.clone(), enabled, period)
        }

        fn read(&self, id: u64) -> Vec<u8> {
            std::fs::read(self.temp_dir.path().join(format!("{}.txt", id))).unwrap()
        }
    }

    #[tokio::test]
    async fn test_two_due_entries_refreshed_sequentially_then_one_commit() {
        let transport = ScriptedTransport::with_delay(Duration::from_millis(10));
        transport.respond("http://lists/a", 200, "new-a\n# c\n");
        transport.respond("http://lists/b", 200, "new-b\nmore-b\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        let report = scheduler.run_cycle().await;

        assert_eq!(report.refreshed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.commit, Some(CommitReport { promoted: 2, failed: 0 }));
        assert_eq!(fx.transport.max_in_flight(), 1);
        assert_eq!(
            fx.transport.events(),
            vec!["get http://lists/a", "get http://lists/b", "close", "restart"]
        );
        assert_eq!(fx.read(1), b"new-a\n# c\n");
        assert_eq!(fx.read(2), b"new-b\nmore-b\n");

        let a = fx.registry.get("http://lists/a").await.unwrap();
        let b = fx.registry.get("http://lists/b").await.unwrap();
        assert_eq!((a.rule_count, b.rule_count), (1, 2));
        assert_eq!((a.pending_id, b.pending_id), (None, None));

        // only the two canonical files remain
        assert_eq!(std::fs::read_dir(fx.temp_dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_stages_without_touching_canonical() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        let entry = fx.registry.select_due(Utc::now()).await.unwrap();
        scheduler.refresh(&entry).await.unwrap();

        let staged = fx.registry.get("http://lists/a").await.unwrap();
        let staged_id = staged.pending_id.unwrap();
        assert_ne!(staged_id, 1);
        assert_eq!(staged.rule_count, 1);
        assert_eq!(fx.read(1), b"old-a\n");
        assert_eq!(fx.read(staged_id), b"new-a\n");
        assert!(scheduler.dirty);
        assert!(!fx.transport.events().contains(&"close".to_string()));
    }

    #[tokio::test]
    async fn test_delete_during_refresh_discards_download() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        let entry = fx.registry.select_due(Utc::now()).await.unwrap();
        fx.registry.delete(&entry.url).await.unwrap();
        scheduler.refresh(&entry).await.unwrap();

        assert!(!scheduler.dirty);
        assert!(!fx.registry.has_pending().await);
        assert_eq!(std::fs::read_dir(fx.temp_dir.path()).unwrap().count(), 2);
        assert_eq!(fx.read(1), b"old-a\n");

        let report = scheduler.commit.commit().await;
        assert_eq!(report, CommitReport::default());
        assert!(!fx.controller.events().contains(&"close".to_string()));
    }

    #[tokio::test]
    async fn test_restage_removes_superseded_file() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));
        let entry = fx.registry.get("http://lists/a").await.unwrap();

        scheduler.refresh(&entry).await.unwrap();
        let first = fx.registry.get_by_id(1).await.unwrap().pending_id.unwrap();
        scheduler.refresh(&entry).await.unwrap();
        let second = fx.registry.get_by_id(1).await.unwrap().pending_id.unwrap();

        assert_ne!(first, second);
        assert!(!fx.temp_dir.path().join(format!("{}.txt", first)).exists());
        assert_eq!(fx.read(second), b"new-a\n");
        assert_eq!(fx.registry.staged().await, vec![(1, second)]);
    }

    #[tokio::test]
    async fn test_failed_download_waits_full_period() {
        let transport = ScriptedTransport::new();
        transport.fail("http://lists/a", "connection refused");
        transport.respond("http://lists/b", 503, "unavailable");
        let fx = Fixture::new(transport).await;
        let before = fx.registry.list().await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        let selected_at = Utc::now();
        let report = scheduler.run_cycle().await;

        assert_eq!(report.refreshed, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.commit, None);
        assert_eq!(fx.transport.calls().len(), 2);
        assert!(!fx.transport.events().contains(&"close".to_string()));

        for (old, new) in before.iter().zip(fx.registry.list().await) {
            assert_eq!(new.rule_count, old.rule_count);
            assert_eq!(new.last_updated, old.last_updated);
            assert_eq!(new.pending_id, None);
            assert!(new.next_update >= selected_at + fx.registry.period());
        }
        assert_eq!(fx.read(1), b"old-a\n");
        assert_eq!(fx.read(2), b"old-b\n");
        assert_eq!(fx.metrics.snapshot().refreshes_failed, 2);

        // not retried before the period elapses
        let report = scheduler.run_cycle().await;
        assert_eq!(report, CycleReport::default());
        assert_eq!(fx.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 500, "boom");
        transport.respond("http://lists/b", 200, "new-b\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        let report = scheduler.run_cycle().await;

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.commit, Some(CommitReport { promoted: 1, failed: 0 }));
        assert_eq!(fx.read(1), b"old-a\n");
        assert_eq!(fx.read(2), b"new-b\n");
    }

    #[tokio::test]
    async fn test_idle_cycle_touches_nothing() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        transport.respond("http://lists/b", 200, "new-b\n");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));
        scheduler.run_cycle().await;
        let events = fx.transport.events();

        let report = scheduler.run_cycle().await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(fx.transport.events(), events);
    }

    #[tokio::test]
    async fn test_pending_rename_retried_next_window() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        transport.fail("http://lists/b", "connection reset");
        let fx = Fixture::new(transport).await;
        let mut scheduler = fx.scheduler(true, Duration::from_secs(3600));

        // b points at a staged file that has gone missing
        fx.registry.stage(2, 900, 7, Utc::now()).await;

        let report = scheduler.run_cycle().await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.commit, Some(CommitReport { promoted: 1, failed: 1 }));
        assert_eq!(fx.read(1), b"new-a\n");
        assert_eq!(fx.read(2), b"old-b\n");
        assert_eq!(fx.registry.staged().await, vec![(2, 900)]);

        // nothing is due, but the pending rename reopens a commit window
        std::fs::write(fx.temp_dir.path().join("900.txt"), "new-b\n").unwrap();
        let report = scheduler.run_cycle().await;
        assert_eq!(report.refreshed, 0);
        assert_eq!(report.commit, Some(CommitReport { promoted: 1, failed: 0 }));
        assert_eq!(fx.read(2), b"new-b\n");
        assert!(!fx.registry.has_pending().await);
        assert_eq!(
            fx.transport.events().iter().filter(|e| *e == "restart").count(),
            2
        );
    }

    #[tokio::test]
    async fn test_disabled_scheduler_never_fetches() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        transport.respond("http://lists/b", 200, "new-b\n");
        let fx = Fixture::new(transport).await;
        let (tx, rx) = watch::channel(false);

        let handle = fx.scheduler(false, Duration::from_millis(5)).spawn(rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(fx.transport.events().is_empty());
        assert_eq!(fx.read(1), b"old-a\n");
    }

    #[tokio::test]
    async fn test_running_scheduler_commits_and_stops() {
        let transport = ScriptedTransport::new();
        transport.respond("http://lists/a", 200, "new-a\n");
        transport.respond("http://lists/b", 200, "new-b\n");
        let fx = Fixture::new(transport).await;
        let (tx, rx) = watch::channel(false);

        let handle = fx.scheduler(true, Duration::from_millis(5)).spawn(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(fx.read(1), b"new-a\n");
        assert_eq!(fx.read(2), b"new-b\n");
        // each list downloaded once: deadlines are a full day out
        assert_eq!(fx.transport.calls().len(), 2);
        assert_eq!(fx.metrics.snapshot().commits, 1);
    }
}
