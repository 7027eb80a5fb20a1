use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered filter list and its refresh metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub id: u64,
    pub enabled: bool,
    pub name: String,
    pub url: String,
    /// Advisory count of usable lines in the latest content
    pub rule_count: u64,
    pub last_updated: DateTime<Utc>,
    /// Refresh becomes eligible once `now >= next_update`
    pub next_update: DateTime<Utc>,
    /// Id of a fully written staged file awaiting commit
    pub pending_id: Option<u64>,
}

impl FilterEntry {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_update <= now
    }
}

/// Candidate passed to `Registry::add`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFilter {
    pub name: String,
    pub url: String,
}

impl NewFilter {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Result of recording a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Entry updated; carries a previously staged id that is now orphaned
    Staged { superseded: Option<u64> },
    /// Entry was deleted while its download was in flight
    Missing,
}
