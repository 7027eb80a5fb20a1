//! In-memory table of filter lists
//!
//! Every scan-then-mutate sequence runs as one critical section over the entry
//! list. The lock is never held across a download or a filesystem call: `add`
//! checks uniqueness, releases the lock for the download and write, then
//! re-checks before inserting.

mod entry;
mod ids;

pub use entry::{FilterEntry, NewFilter, StageOutcome};
pub use ids::IdGenerator;

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::error::{Result, SyncError};
use crate::fetcher::Fetcher;
use crate::parser;
use crate::storage::FilterStore;

pub struct Registry {
    entries: Mutex<Vec<FilterEntry>>,
    fetcher: Arc<Fetcher>,
    store: FilterStore,
    ids: IdGenerator,
    period: TimeDelta,
}

impl Registry {
    pub fn new(fetcher: Arc<Fetcher>, store: FilterStore, period: TimeDelta) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fetcher,
            store,
            ids: IdGenerator::new(),
            period,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn store(&self) -> &FilterStore {
        &self.store
    }

    pub fn period(&self) -> TimeDelta {
        self.period
    }

    /// Mint a fresh id for a canonical or staged file
    pub fn mint_id(&self) -> u64 {
        self.ids.next()
    }

    /// Seed the registry with configured filters, reading their current content from disk
    ///
    /// An entry whose file cannot be read is still registered and left due
    /// immediately so the scheduler fetches it on its first pass.
    pub async fn load(&self, filters: &[FilterConfig]) {
        let mut seeded = Vec::with_capacity(filters.len());

        for filter in filters {
            self.ids.observe(filter.id);

            let mut entry = FilterEntry {
                id: filter.id,
                enabled: filter.enabled,
                name: filter.name.clone(),
                url: filter.url.clone(),
                rule_count: 0,
                last_updated: DateTime::<Utc>::UNIX_EPOCH,
                next_update: DateTime::<Utc>::UNIX_EPOCH,
                pending_id: None,
            };

            match self.store.load(filter.id).await {
                Ok((body, modified)) => {
                    entry.rule_count = parser::summarize(&body);
                    entry.last_updated = modified;
                    entry.next_update = deadline(modified, self.period);
                }
                Err(e) => {
                    error!(
                        id = filter.id,
                        path = %self.store.path_for(filter.id).display(),
                        error = %e,
                        "Failed to read filter file"
                    );
                }
            }

            seeded.push(entry);
        }

        let mut entries = self.entries.lock().await;
        entries.extend(seeded);
        info!(count = entries.len(), "Filter registry loaded");
    }

    /// Register a new filter list
    ///
    /// The list is downloaded straight to its canonical path before the entry
    /// becomes visible. Any failure leaves the registry untouched.
    pub async fn add(&self, candidate: NewFilter) -> Result<FilterEntry> {
        {
            let entries = self.entries.lock().await;
            ensure_unique(&entries, &candidate)?;
        }

        let id = self.ids.next();
        let body = self.fetcher.download(&candidate.url).await.map_err(|e| {
            debug!(url = %candidate.url, error = %e, "Filter download failed");
            SyncError::from(e)
        })?;
        let rule_count = parser::summarize(&body);
        self.store.write(id, &body).await?;

        let now = Utc::now();
        let entry = FilterEntry {
            id,
            enabled: true,
            name: candidate.name,
            url: candidate.url,
            rule_count,
            last_updated: now,
            next_update: deadline(now, self.period),
            pending_id: None,
        };

        let mut entries = self.entries.lock().await;
        if let Err(e) = ensure_unique(&entries, &NewFilter::new(&entry.name, &entry.url)) {
            drop(entries);
            if let Err(remove_err) = self.store.remove(id).await {
                warn!(id, error = %remove_err, "Failed to remove file of rejected filter");
            }
            return Err(e);
        }
        entries.push(entry.clone());

        info!(id, url = %entry.url, rule_count, "Added filter");
        Ok(entry)
    }

    /// Remove the first entry whose url matches; the file on disk is left alone
    pub async fn delete(&self, url: &str) -> Option<FilterEntry> {
        let mut entries = self.entries.lock().await;
        let index = entries.iter().position(|e| e.url == url)?;
        let removed = entries.remove(index);
        info!(id = removed.id, url, "Removed filter");
        Some(removed)
    }

    /// Pick the first due entry in insertion order and reserve its next slot
    ///
    /// `next_update` is advanced by one full period before the download is
    /// attempted, so a failed refresh waits for the next period.
    pub async fn select_due(&self, now: DateTime<Utc>) -> Option<FilterEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries.iter_mut().find(|e| e.is_due(now))?;
        entry.next_update = deadline(now, self.period);
        Some(entry.clone())
    }

    /// Record a refreshed entry whose content sits in the staged file `staged_id`
    pub async fn stage(
        &self,
        id: u64,
        staged_id: u64,
        rule_count: u64,
        last_updated: DateTime<Utc>,
    ) -> StageOutcome {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return StageOutcome::Missing;
        };

        entry.rule_count = rule_count;
        entry.last_updated = last_updated;
        if entry.next_update < last_updated {
            entry.next_update = last_updated;
        }
        let superseded = entry.pending_id.replace(staged_id);

        StageOutcome::Staged { superseded }
    }

    /// `(canonical_id, staged_id)` for every entry awaiting commit
    pub async fn staged(&self) -> Vec<(u64, u64)> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter_map(|e| e.pending_id.map(|staged| (e.id, staged)))
            .collect()
    }

    pub async fn has_pending(&self) -> bool {
        let entries = self.entries.lock().await;
        entries.iter().any(|e| e.pending_id.is_some())
    }

    /// Clear `pending_id` if it still refers to `staged_id`
    pub async fn clear_pending(&self, id: u64, staged_id: u64) -> bool {
        let mut entries = self.entries.lock().await;
        match entries
            .iter_mut()
            .find(|e| e.id == id && e.pending_id == Some(staged_id))
        {
            Some(entry) => {
                entry.pending_id = None;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, url: &str) -> Option<FilterEntry> {
        let entries = self.entries.lock().await;
        entries.iter().find(|e| e.url == url).cloned()
    }

    pub async fn get_by_id(&self, id: u64) -> Option<FilterEntry> {
        let entries = self.entries.lock().await;
        entries.iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of all entries in insertion order
    pub async fn list(&self) -> Vec<FilterEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// `from + period`, clamped to the latest representable time
fn deadline(from: DateTime<Utc>, period: TimeDelta) -> DateTime<Utc> {
    from.checked_add_signed(period).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn ensure_unique(entries: &[FilterEntry], candidate: &NewFilter) -> Result<()> {
    if entries
        .iter()
        .any(|e| e.name == candidate.name || e.url == candidate.url)
    {
        return Err(SyncError::Duplicate {
            name: candidate.name.clone(),
            url: candidate.url.clone(),
        });
    }
    Ok(())
}
