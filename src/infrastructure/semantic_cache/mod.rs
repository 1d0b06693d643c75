//! Semantic cache store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheStoreFactory, StoreConfig, StoreType};
pub use in_memory::InMemoryCacheStore;
pub use self::redis::{RedisCacheStore, RedisStoreConfig};
