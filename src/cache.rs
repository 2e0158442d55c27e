//! Scope-keyed read cache with explicit invalidation.
//!
//! Every scope carries a generation counter. A mutation that succeeds bumps
//! the generation of each scope it touched before reporting success, and
//! fetched rows are only published when the generation did not move while
//! the fetch was in flight. Together these keep any read issued after a
//! successful mutation from observing rows older than that mutation.

use crate::core::{CollectionKind, ParentId, Row, ScopeKey};
use log::debug;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct CachedRows {
    generation: u64,
    rows: Arc<Vec<Row>>,
}

struct CacheState {
    generations: HashMap<ScopeKey, watch::Sender<u64>>,
    entries: LruCache<ScopeKey, CachedRows>,
    invalidations: u64,
}

impl CacheState {
    fn sender(&mut self, scope: &ScopeKey) -> &watch::Sender<u64> {
        self.generations
            .entry(scope.clone())
            .or_insert_with(|| watch::channel(0).0)
    }

    fn generation(&self, scope: &ScopeKey) -> u64 {
        self.generations
            .get(scope)
            .map(|sender| *sender.borrow())
            .unwrap_or(0)
    }
}

/// Counters describing the cache, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub tracked_scopes: usize,
    pub cached_scopes: usize,
    pub invalidations: u64,
}

/// Session-wide cache of parent-scoped rows.
///
/// Cloning yields another handle to the same cache. Build one per session
/// and call [`CollectionCache::clear`] when the session ends.
#[derive(Clone)]
pub struct CollectionCache {
    state: Arc<Mutex<CacheState>>,
}

impl Default for CollectionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl CollectionCache {
    /// Cache holding rows for at most `capacity` scopes (minimum 1).
    /// Least recently used scopes lose their rows first and are re-fetched.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                generations: HashMap::new(),
                entries: LruCache::new(capacity),
                invalidations: 0,
            })),
        }
    }

    // Critical sections are single inserts or removals, so a poisoned lock
    // still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current generation of `scope`; 0 until it is first invalidated.
    pub fn generation(&self, scope: &ScopeKey) -> u64 {
        self.lock().generation(scope)
    }

    /// Receiver that changes every time `scope` is invalidated.
    pub fn subscribe(&self, scope: &ScopeKey) -> watch::Receiver<u64> {
        self.lock().sender(scope).subscribe()
    }

    /// Cached rows for `scope` if they are still current.
    pub fn get(&self, scope: &ScopeKey) -> Option<Arc<Vec<Row>>> {
        let mut state = self.lock();
        let current = state.generation(scope);
        match state.entries.get(scope) {
            Some(cached) if cached.generation == current => Some(cached.rows.clone()),
            _ => None,
        }
    }

    /// Publishes rows fetched while the scope was at generation `fetched_at`.
    ///
    /// Returns `false` and discards the rows when the scope was invalidated
    /// after the fetch started.
    pub fn store_if_current(&self, scope: &ScopeKey, fetched_at: u64, rows: Vec<Row>) -> bool {
        let mut state = self.lock();
        if state.generation(scope) != fetched_at {
            debug!(
                "discarding rows for {} fetched at generation {}",
                scope, fetched_at
            );
            return false;
        }
        state.entries.put(
            scope.clone(),
            CachedRows {
                generation: fetched_at,
                rows: Arc::new(rows),
            },
        );
        true
    }

    /// Marks `scope` stale and wakes every reader subscribed to it.
    pub fn invalidate(&self, scope: &ScopeKey) {
        let mut state = self.lock();
        state.entries.pop(scope);
        state.sender(scope).send_modify(|generation| *generation += 1);
        state.invalidations += 1;
        debug!("invalidated {}", scope);
    }

    /// Invalidates every collection kind of `parent_id`.
    pub fn invalidate_parent(&self, parent_id: &ParentId) {
        for kind in [CollectionKind::ParentRecord, CollectionKind::Images] {
            self.invalidate(&ScopeKey::new(parent_id.clone(), kind));
        }
    }

    /// Drops all cached rows and invalidates every known scope.
    ///
    /// Readers that outlive the session re-fetch instead of serving rows
    /// from it.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        let mut bumped = 0;
        for sender in state.generations.values() {
            sender.send_modify(|generation| *generation += 1);
            bumped += 1;
        }
        state.invalidations += bumped;
        debug!("cache cleared, {} scopes invalidated", bumped);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            tracked_scopes: state.generations.len(),
            cached_scopes: state.entries.len(),
            invalidations: state.invalidations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(id: &str) -> ScopeKey {
        ScopeKey::images(ParentId::new(id))
    }

    fn rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("order".to_string(), json!(i));
                row
            })
            .collect()
    }

    #[test]
    fn fresh_rows_are_served_until_invalidated() {
        let cache = CollectionCache::default();
        let key = scope("cs1");

        assert!(cache.store_if_current(&key, 0, rows(2)));
        assert_eq!(cache.get(&key).map(|r| r.len()), Some(2));

        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.generation(&key), 1);
    }

    #[test]
    fn fetch_started_before_invalidation_is_not_published() {
        let cache = CollectionCache::default();
        let key = scope("cs1");

        let fetched_at = cache.generation(&key);
        cache.invalidate(&key);

        assert!(!cache.store_if_current(&key, fetched_at, rows(3)));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn invalidation_is_scoped_to_one_parent() {
        let cache = CollectionCache::default();
        cache.store_if_current(&scope("cs1"), 0, rows(1));
        cache.store_if_current(&scope("cs2"), 0, rows(1));

        cache.invalidate(&scope("cs1"));

        assert!(cache.get(&scope("cs1")).is_none());
        assert!(cache.get(&scope("cs2")).is_some());
    }

    #[test]
    fn lru_evicts_rows_but_keeps_generations() {
        let cache = CollectionCache::with_capacity(1);
        cache.invalidate(&scope("cs1"));
        cache.store_if_current(&scope("cs1"), 1, rows(1));
        cache.store_if_current(&scope("cs2"), 0, rows(1));

        assert!(cache.get(&scope("cs1")).is_none());
        assert_eq!(cache.generation(&scope("cs1")), 1);
        assert_eq!(cache.stats().cached_scopes, 1);
    }

    #[tokio::test]
    async fn subscribers_wake_on_invalidation_and_clear() {
        let cache = CollectionCache::default();
        let key = scope("cs1");
        let mut rx = cache.subscribe(&key);

        cache.invalidate(&key);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        cache.clear();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
        assert_eq!(cache.stats().invalidations, 2);
    }
}
