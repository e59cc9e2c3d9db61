//! Bounded, short-lived cache of stat results keyed by logical path.
//!
//! Object-store stat calls are network round-trips, and directory browsing
//! re-stats the same paths many times in quick succession. Entries live for
//! a short TTL; re-inserting a key moves it to the back of the insertion
//! order and the front is evicted once capacity is exceeded.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::types::StatEntry;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Default maximum number of cached paths.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Stat cache owned by one filesystem instance.
///
/// Interior locking makes the cache safe to share across tasks; a lookup
/// followed by a backend refresh is not atomic, so two concurrent misses on
/// the same path may both reach the backend.
#[derive(Debug)]
pub struct StatCache {
    entries: Mutex<IndexMap<String, StatEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for StatCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl StatCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fresh entry for `path`, or `None` on a miss or a stale entry.
    pub fn get(&self, path: &str) -> Option<StatEntry> {
        self.get_at(path, Instant::now())
    }

    fn get_at(&self, path: &str, now: Instant) -> Option<StatEntry> {
        let entries = self.entries.lock();
        entries
            .get(path)
            .filter(|st| now.saturating_duration_since(st.retrieved_at) < self.ttl)
            .cloned()
    }

    /// Insert or refresh an entry, evicting the oldest insertion on overflow.
    pub fn put(&self, path: impl Into<String>, entry: StatEntry) {
        let path = path.into();
        let mut entries = self.entries.lock();
        entries.shift_remove(&path);
        entries.insert(path, entry);
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::trace!(path = %evicted, "stat cache eviction");
            }
        }
    }

    /// Drop the entry for exactly `path`.
    pub fn invalidate(&self, path: &str) {
        self.entries.lock().shift_remove(path);
    }

    /// Drop `path` and every cached path beneath it.
    pub fn invalidate_tree(&self, path: &str, separator: &str) {
        let mut entries = self.entries.lock();
        if path.is_empty() {
            entries.clear();
            return;
        }
        let nested = format!("{path}{separator}");
        entries.retain(|key, _| key != path && !key.starts_with(&nested));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
