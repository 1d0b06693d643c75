//! Storage contract shared by the in-memory and Redis backends

use std::fmt::Debug;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{CacheEntry, Tags};
use crate::domain::CacheError;

/// Keyed storage for cache entries with tag indexing.
///
/// Eviction, shared by every backend: when a capacity is configured and a
/// write would add a new key to a full store, the live entry with the oldest
/// `created_at` is removed first. Overwriting an existing key never evicts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Insert or replace the entry stored under `key`
    async fn write(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Get a live entry by key
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// All live entries with their keys, in the backend's iteration order.
    ///
    /// Backends may purge expired entries they come across; a purged entry
    /// is never part of the returned list.
    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>, CacheError>;

    /// Remove an entry and its tag memberships. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry carrying any of the given tags. Returns how many were removed.
    async fn invalidate_by_tags(&self, tags: &Tags) -> Result<usize, CacheError>;

    /// Remove all entries and tag indices
    async fn clear(&self) -> Result<(), CacheError>;

    /// Number of tracked entries
    async fn size(&self) -> Result<usize, CacheError>;
}
