//! Telegram update deduplication cache

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default dedup TTL (5 minutes)
const DEDUP_TTL_SECS: u64 = 300;

/// Maximum dedup cache entries
const DEDUP_MAX_ENTRIES: usize = 2000;

/// Telegram update deduplication cache
///
/// Remembers recently dispatched `update_id`s so a redelivered update (a
/// webhook retry, or the same update arriving on both ingress paths) fires
/// its trigger once. Uses a TTL-based eviction strategy with a hard cap on
/// entries.
#[derive(Debug)]
pub struct UpdateDedup {
    seen: HashMap<i64, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for UpdateDedup {
    fn default() -> Self {
        Self::with_limits(Duration::from_secs(DEDUP_TTL_SECS), DEDUP_MAX_ENTRIES)
    }
}

impl UpdateDedup {
    /// Create a cache with a custom TTL and capacity
    #[must_use]
    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Number of remembered updates
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing is remembered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Check if the given update has been seen recently.
    ///
    /// Returns `true` if this is a duplicate (already seen within TTL).
    /// Returns `false` on first sight and records the update.
    pub fn is_duplicate(&mut self, update_id: i64) -> bool {
        let now = Instant::now();

        if let Some(ts) = self.seen.get(&update_id)
            && now.duration_since(*ts) < self.ttl
        {
            return true;
        }

        // Evict expired entries when at capacity
        if self.seen.len() >= self.max_entries {
            self.seen.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        // Still full: drop the oldest entry
        if self.seen.len() >= self.max_entries
            && let Some(oldest) = self
                .seen
                .iter()
                .min_by_key(|(_, ts)| **ts)
                .map(|(id, _)| *id)
        {
            self.seen.remove(&oldest);
        }

        self.seen.insert(update_id, now);
        false
    }
}
