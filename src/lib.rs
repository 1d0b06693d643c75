//! Semantic cache
//!
//! Caches expensive responses (typically LLM completions) keyed by the
//! meaning of a query rather than its exact text:
//! - Cosine-similarity lookup over query embeddings
//! - In-memory and Redis stores with TTL, tags and creation-time eviction
//! - Hit/miss statistics with estimated cost savings

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::embedding::{cosine_similarity, EmbeddingProvider};
pub use domain::semantic_cache::{
    CacheEntry, CacheStore, FetchOptions, ModelCostTable, SemanticCacheConfig, StatsSnapshot,
    Tags,
};
pub use domain::CacheError;
pub use infrastructure::embedding::{EmbeddingGenerator, HttpClient, OpenAiEmbeddingProvider};
pub use infrastructure::semantic_cache::{
    CacheStoreFactory, InMemoryCacheStore, RedisCacheStore, StoreConfig, StoreType,
};
pub use infrastructure::services::SemanticCacheService;
