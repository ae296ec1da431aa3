// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity LRU cache.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::{debug, trace};

use super::{CacheEntry, CacheStats};
use crate::types::CacheKey;

#[derive(Debug)]
struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Fixed-capacity, recency-ordered cache of ABI artifacts.
///
/// - `get` is O(1) and promotes the entry to most-recently-used
/// - `set` inserts or merges at most-recently-used; when that pushes the size
///   past capacity exactly one least-recently-used entry is evicted
/// - size never exceeds capacity
///
/// The internal mutex is only held for the duration of one map operation and
/// never across an `.await`, so reads never wait on the store or network.
#[derive(Debug)]
pub struct BoundedCache {
    capacity: NonZeroUsize,
    state: Mutex<CacheState>,
}

impl BoundedCache {
    /// Creates an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry for `key`, promoting it to most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut state = self.state();
        match state.entries.get(key).cloned() {
            Some(entry) => {
                state.hits += 1;
                trace!(key = %key, "Cache hit");
                Some(entry)
            }
            None => {
                state.misses += 1;
                trace!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Inserts `entry` at most-recently-used, merging with any existing entry.
    pub fn set(&self, key: CacheKey, entry: CacheEntry) {
        let mut state = self.state();
        if let Some(existing) = state.entries.get_mut(&key) {
            existing.merge(entry);
            return;
        }
        if let Some((evicted, _)) = state.entries.push(key, entry) {
            state.evictions += 1;
            debug!(key = %evicted, "Evicting LRU cache entry");
        }
    }

    /// Merges `entry` into an existing entry without changing its recency.
    ///
    /// Returns `false` and does nothing when `key` is not cached.
    pub fn refresh(&self, key: &CacheKey, entry: CacheEntry) -> bool {
        let mut state = self.state();
        match state.entries.peek_mut(key) {
            Some(existing) => {
                existing.merge(entry);
                true
            }
            None => false,
        }
    }

    /// Drops `key` if cached. Returns whether an entry was removed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.state().entries.pop(key).is_some()
    }

    /// Whether `key` is cached, without promoting it or counting a hit.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.state();
        debug!(entries = state.entries.len(), "Clearing ABI cache");
        state.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            entries: state.entries.len(),
            capacity: self.capacity.get(),
        }
    }
}
