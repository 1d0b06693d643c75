//! Store factory for runtime backend selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::semantic_cache::{CacheStore, SemanticCacheConfig};
use crate::domain::CacheError;

use super::in_memory::InMemoryCacheStore;
use super::redis::{RedisCacheStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StoreType {
    /// Single-process store behind one lock
    #[default]
    Memory,
    /// Shared Redis store
    Redis,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Memory => write!(f, "memory"),
            StoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in_memory" | "inmemory" => Ok(StoreType::Memory),
            "redis" => Ok(StoreType::Redis),
            _ => Err(CacheError::configuration(format!(
                "Unknown store type: {}. Valid types: memory, redis",
                s
            ))),
        }
    }
}

/// Store selection and backend options
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend name, parsed into a `StoreType` when the store is built
    #[serde(default = "default_store_type")]
    pub store_type: String,
    /// Redis URL (required for the Redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Redis connection timeout in seconds
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

fn default_store_type() -> String {
    StoreType::Memory.to_string()
}

fn default_connection_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            redis_url: None,
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store_type: StoreType::Redis.to_string(),
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// Factory for creating store instances
#[derive(Debug, Default)]
pub struct CacheStoreFactory;

impl CacheStoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build the configured store, sized and namespaced from the cache config
    pub async fn create(
        &self,
        store: &StoreConfig,
        cache: &SemanticCacheConfig,
    ) -> Result<Arc<dyn CacheStore>, CacheError> {
        match store.store_type.parse::<StoreType>()? {
            StoreType::Memory => Ok(match cache.max_cache_size {
                Some(max) => Arc::new(InMemoryCacheStore::with_max_size(max)),
                None => Arc::new(InMemoryCacheStore::new()),
            }),
            StoreType::Redis => {
                let url = store.redis_url.clone().ok_or_else(|| {
                    CacheError::configuration("Redis URL is required for the redis store")
                })?;

                let mut config = RedisStoreConfig::new(url)
                    .with_namespace(cache.namespace.clone())
                    .with_connection_timeout(Duration::from_secs(store.connection_timeout_secs));

                if let Some(max) = cache.max_cache_size {
                    config = config.with_max_size(max);
                }

                Ok(Arc::new(RedisCacheStore::new(config).await?))
            }
        }
    }
}
