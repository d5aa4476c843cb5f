//! In-memory storage for attempt entries.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::entry::RateLimitEntry;

/// Identifier to entry map guarded by a single mutex.
///
/// Every method holds the lock for the whole operation, so a read-modify-write
/// done through [`AttemptStore::with_entries`] cannot interleave with any other
/// access, including the sweep.
#[derive(Debug, Default)]
pub struct AttemptStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl AttemptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the whole map.
    pub fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, RateLimitEntry>) -> R) -> R {
        let mut entries = self.entries.lock();
        f(&mut entries)
    }

    /// Copy of the entry for an identifier.
    pub fn get(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries.lock().get(identifier).copied()
    }

    /// Remove the entry for an identifier.
    pub fn remove(&self, identifier: &str) -> Option<RateLimitEntry> {
        self.entries.lock().remove(identifier)
    }

    /// Drop every entry whose window ended before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self, now: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
