//! Semantic cache service
//!
//! Answers a query from the cache when a stored query is similar enough,
//! otherwise runs the caller's producer and caches what it returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::embedding::{cosine_similarity, EmbeddingProvider};
use crate::domain::semantic_cache::{
    derive_cache_key, CacheEntry, CacheStore, FetchOptions, ModelCostTable, SemanticCacheConfig,
    StatsSnapshot, StatsTracker, Tags,
};
use crate::domain::CacheError;
use crate::infrastructure::embedding::EmbeddingGenerator;
use crate::infrastructure::semantic_cache::{CacheStoreFactory, StoreConfig};

/// Cache engine over a store, an embedding generator and a stats tracker
#[derive(Debug)]
pub struct SemanticCacheService {
    store: Arc<dyn CacheStore>,
    generator: EmbeddingGenerator,
    config: SemanticCacheConfig,
    costs: ModelCostTable,
    stats: StatsTracker,
}

impl SemanticCacheService {
    /// Create a service, rejecting an invalid configuration
    pub fn new(
        store: Arc<dyn CacheStore>,
        generator: EmbeddingGenerator,
        config: SemanticCacheConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        Ok(Self {
            store,
            generator,
            config,
            costs: ModelCostTable::default(),
            stats: StatsTracker::new(),
        })
    }

    /// Build the store from `store_config` and embed through `provider`
    pub async fn from_config(
        config: SemanticCacheConfig,
        store_config: &StoreConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        let store = CacheStoreFactory::new().create(store_config, &config).await?;
        let generator = EmbeddingGenerator::from_config(provider, &config);

        info!(
            store = %store_config.store_type,
            namespace = %config.namespace,
            threshold = config.similarity_threshold,
            "Semantic cache initialized"
        );

        Self::new(store, generator, config)
    }

    /// Replace the price table used for savings estimates
    pub fn with_cost_table(mut self, costs: ModelCostTable) -> Self {
        self.costs = costs;
        self
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    /// Return a cached response for a similar query, or run `producer` and cache its result.
    ///
    /// Embedding, store and producer failures propagate unchanged. Nothing is
    /// written unless the producer succeeds.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        query: &str,
        options: FetchOptions,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if query.trim().is_empty() {
            return Err(CacheError::invalid_argument("query cannot be blank").into());
        }

        let started = Instant::now();
        let embedding = self.generator.generate(query).await?;

        if let Some((key, entry, similarity)) = self.find_best_match(&embedding).await? {
            let saved = self.estimate_savings(options.model_hint.as_deref(), query, &entry);
            self.stats.record_hit(saved, started.elapsed());

            debug!(key = %key, similarity, "Semantic cache hit");

            let value = serde_json::from_value(entry.response().clone()).map_err(CacheError::from)?;
            return Ok(value);
        }

        let produce_started = Instant::now();
        let result = producer().await?;
        self.stats.record_miss(produce_started.elapsed());

        let response = serde_json::to_value(&result).map_err(CacheError::from)?;
        let key = derive_cache_key(&self.config.namespace, query);

        let FetchOptions {
            ttl,
            tags,
            model_hint,
            metadata,
        } = options;

        let mut entry = CacheEntry::new(query, embedding, response)
            .with_ttl(ttl.or_else(|| self.config.default_ttl()))
            .with_tags(tags)
            .with_metadata(metadata);
        if let Some(model) = model_hint {
            entry = entry.with_model(model);
        }

        self.store.write(&key, entry).await?;

        debug!(key = %key, "Semantic cache miss, stored new entry");

        Ok(result)
    }

    /// Highest-scoring live entry at or above the threshold.
    ///
    /// Single pass; on equal scores the earlier entry wins. A stored vector
    /// of a different length fails the lookup with InvalidArgument.
    async fn find_best_match(
        &self,
        embedding: &[f32],
    ) -> Result<Option<(String, CacheEntry, f32)>, CacheError> {
        let mut best: Option<(String, CacheEntry, f32)> = None;

        for (key, entry) in self.store.entries().await? {
            let score = cosine_similarity(embedding, entry.embedding()).inspect_err(|e| {
                warn!(key = %key, error = %e, "Query embedding does not match stored length");
            })?;

            if best.as_ref().is_none_or(|(_, _, top)| score > *top) {
                best = Some((key, entry, score));
            }
        }

        Ok(best.filter(|(_, _, score)| *score >= self.config.similarity_threshold))
    }

    fn estimate_savings(&self, model_hint: Option<&str>, query: &str, entry: &CacheEntry) -> f64 {
        match model_hint {
            Some(model) if self.config.track_costs => {
                self.costs.estimate(model, query, entry.response())
            }
            _ => 0.0,
        }
    }

    /// Remove every entry carrying any of `tags`
    pub async fn invalidate(&self, tags: impl Into<Tags>) -> Result<usize, CacheError> {
        let tags = tags.into();
        let removed = self.store.invalidate_by_tags(&tags).await?;

        info!(tags = ?tags, removed, "Invalidated semantic cache entries");

        Ok(removed)
    }

    /// Remove the entry stored for exactly this query
    pub async fn delete(&self, query: &str) -> Result<bool, CacheError> {
        let key = derive_cache_key(&self.config.namespace, query);
        self.store.delete(&key).await
    }

    /// Empty the store and reset statistics
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await?;
        self.stats.reset();

        info!(namespace = %self.config.namespace, "Semantic cache cleared");

        Ok(())
    }

    pub async fn size(&self) -> Result<usize, CacheError> {
        self.store.size().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn report(&self) -> String {
        self.stats.report()
    }
}
