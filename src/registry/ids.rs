use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mints filter ids from wall-clock seconds
///
/// Ids are strictly increasing: two ids requested within the same second get
/// consecutive values instead of colliding. Zero is never returned.
/// Configured ids are bounded well below `u64::MAX`, where minting saturates.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp().max(1) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Make sure future ids are greater than an id already in use
    pub fn observe(&self, id: u64) {
        self.last.fetch_max(id, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_unique_within_same_second() {
        let ids = IdGenerator::new();
        let minted: HashSet<u64> = (0..1000).map(|_| ids.next()).collect();
        assert_eq!(minted.len(), 1000);
    }

    #[test]
    fn test_ids_track_wall_clock() {
        let ids = IdGenerator::new();
        let now = Utc::now().timestamp() as u64;
        let id = ids.next();
        assert!(id >= now && id <= now + 1);
    }

    #[test]
    fn test_observe_pushes_past_existing_ids() {
        let ids = IdGenerator::new();
        let far_future = Utc::now().timestamp() as u64 + 10_000;
        ids.observe(far_future);
        assert_eq!(ids.next(), far_future + 1);
    }

    #[test]
    fn test_next_saturates_instead_of_overflowing() {
        let ids = IdGenerator::new();
        ids.observe(u64::MAX);
        assert_eq!(ids.next(), u64::MAX);
    }
}
