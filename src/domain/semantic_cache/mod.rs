//! Semantic cache domain models and traits
//!
//! Provides vector-based caching that matches semantically similar queries
//! rather than requiring exact key matches.

mod config;
mod cost;
mod entry;
mod key;
mod options;
mod stats;
mod store;

pub use config::SemanticCacheConfig;
pub use cost::ModelCostTable;
pub use entry::{CacheEntry, Tags};
pub use key::{derive_cache_key, CACHE_KEY_LENGTH};
pub use options::FetchOptions;
pub use stats::{CacheEvent, StatsSnapshot, StatsTracker};
pub use store::CacheStore;

#[cfg(test)]
pub use store::MockCacheStore;
