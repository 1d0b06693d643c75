//! In-memory semantic cache store

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::semantic_cache::{CacheEntry, CacheStore, Tags};
use crate::domain::CacheError;

#[derive(Debug)]
struct Slot {
    seq: u64,
    entry: CacheEntry,
}

/// Everything guarded by the store lock
#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, Slot>,
    /// Insertion order; an overwritten key keeps its original position
    order: BTreeMap<u64, String>,
    tag_index: HashMap<String, HashSet<String>>,
    next_seq: u64,
}

impl StoreState {
    fn insert(&mut self, key: &str, entry: CacheEntry) {
        let tags: Vec<String> = entry.tags().iter().map(str::to_string).collect();

        if let Some(slot) = self.entries.get_mut(key) {
            let previous = std::mem::replace(&mut slot.entry, entry);
            self.unindex(key, previous.tags());
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.order.insert(seq, key.to_string());
            self.entries.insert(key.to_string(), Slot { seq, entry });
        }

        for tag in tags {
            self.tag_index.entry(tag).or_default().insert(key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        self.unindex(key, slot.entry.tags());
        Some(slot.entry)
    }

    fn unindex(&mut self, key: &str, tags: &Tags) {
        for tag in tags.iter() {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .order
            .values()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|slot| slot.entry.is_expired_at(now))
            })
            .cloned()
            .collect();

        for key in &expired {
            self.remove(key);
        }

        expired.len()
    }

    /// Key of the entry with the smallest `created_at`; ties go to the
    /// earliest inserted key
    fn oldest_key(&self) -> Option<String> {
        self.order
            .values()
            .filter_map(|key| self.entries.get(key).map(|slot| (key, slot.entry.created_at())))
            .min_by_key(|(_, created_at)| *created_at)
            .map(|(key, _)| key.clone())
    }

    fn live_get(&mut self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let expired = self.entries.get(key)?.entry.is_expired_at(now);

        if expired {
            self.remove(key);
            return None;
        }

        self.entries.get(key).map(|slot| slot.entry.clone())
    }
}

/// In-memory store using linear scans under a single lock.
///
/// Expired entries are purged lazily whenever an operation encounters them.
/// Suitable for a single process; use the Redis store to share a cache.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    state: Mutex<StoreState>,
    max_size: Option<usize>,
    evictions: AtomicU64,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            max_size: None,
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a store holding at most `max_size` entries (at least one)
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size.max(1)),
            ..Self::new()
        }
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Number of entries removed to make room since creation
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, CacheError> {
        self.state
            .lock()
            .map_err(|e| CacheError::store(format!("Failed to acquire store lock: {}", e)))
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn write(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut state = self.lock()?;

        if let Some(max_size) = self.max_size {
            if !state.entries.contains_key(key) {
                state.purge_expired(Utc::now());

                if state.entries.len() >= max_size {
                    if let Some(oldest) = state.oldest_key() {
                        state.remove(&oldest);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %oldest, "Evicted oldest semantic cache entry");
                    }
                }
            }
        }

        state.insert(key, entry);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut state = self.lock()?;
        Ok(state.live_get(key, Utc::now()))
    }

    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>, CacheError> {
        let mut state = self.lock()?;
        state.purge_expired(Utc::now());

        Ok(state
            .order
            .values()
            .filter_map(|key| {
                state
                    .entries
                    .get(key)
                    .map(|slot| (key.clone(), slot.entry.clone()))
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut state = self.lock()?;
        Ok(state.remove(key).is_some())
    }

    async fn invalidate_by_tags(&self, tags: &Tags) -> Result<usize, CacheError> {
        let mut state = self.lock()?;

        let keys: BTreeSet<String> = tags
            .iter()
            .filter_map(|tag| state.tag_index.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect();

        let removed = keys
            .iter()
            .filter(|key| state.remove(key).is_some())
            .count();

        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.lock()?;
        *state = StoreState::default();
        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        let mut state = self.lock()?;
        state.purge_expired(Utc::now());
        Ok(state.entries.len())
    }
}
