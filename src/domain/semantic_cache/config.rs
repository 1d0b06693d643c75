//! Semantic cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::CacheError;

/// Configuration for semantic caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Similarity threshold for cache hits (0.0 to 1.0)
    /// Higher values require more similar queries
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// TTL in milliseconds applied when a fetch does not set its own;
    /// absent means never expire
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,

    /// Namespace prefix for cache keys
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Maximum number of entries to store; absent means unbounded
    #[serde(default)]
    pub max_cache_size: Option<usize>,

    /// Whether hits accumulate estimated cost savings
    #[serde(default = "default_true")]
    pub track_costs: bool,

    /// Embedding model to use
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Upper bound on a single embedding call, in milliseconds
    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_namespace() -> String {
    "semantic_cache".to_string()
}

fn default_true() -> bool {
    true
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout_ms() -> u64 {
    30_000
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            default_ttl_ms: None,
            namespace: default_namespace(),
            max_cache_size: None,
            track_costs: default_true(),
            embedding_model: default_embedding_model(),
            embedding_timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the default TTL as Duration
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_ms.map(Duration::from_millis)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding_timeout_ms)
    }

    /// Set the similarity threshold, clamped to [0, 1]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the fallback TTL. Kept at millisecond precision.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_ms = Some(duration_to_ms(ttl));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_cache_size(mut self, max: usize) -> Self {
        self.max_cache_size = Some(max);
        self
    }

    pub fn with_track_costs(mut self, track: bool) -> Self {
        self.track_costs = track;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set the embedding timeout. Kept at millisecond precision.
    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.embedding_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Reject settings that could only have come from a bad config source
    pub fn validate(&self) -> Result<(), CacheError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CacheError::configuration(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }

        if self.namespace.trim().is_empty() {
            return Err(CacheError::configuration("namespace cannot be blank"));
        }

        if self.namespace.contains(['*', '?', '[', ']', '\\']) {
            return Err(CacheError::configuration(format!(
                "namespace cannot contain glob characters, got '{}'",
                self.namespace
            )));
        }

        if self.default_ttl_ms == Some(0) {
            return Err(CacheError::configuration(
                "default_ttl must be at least 1ms when set",
            ));
        }

        if self.embedding_timeout_ms == 0 {
            return Err(CacheError::configuration(
                "embedding_timeout must be at least 1ms",
            ));
        }

        if self.max_cache_size == Some(0) {
            return Err(CacheError::configuration(
                "max_cache_size must be positive when set",
            ));
        }

        Ok(())
    }
}
