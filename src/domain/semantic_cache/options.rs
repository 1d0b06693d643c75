//! Per-call fetch options

use std::time::Duration;

use super::Tags;

/// Options attached to a single `fetch`
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the configured default TTL for an entry created by this call
    pub ttl: Option<Duration>,
    pub tags: Tags,
    /// Model the producer calls; used for cost accounting on hits
    pub model_hint: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_model_hint(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
