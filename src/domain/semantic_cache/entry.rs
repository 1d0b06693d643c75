//! Cached entry and tag types

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::CacheError;

/// A set of labels used for bulk invalidation.
///
/// A single tag and a collection of tags are both accepted and normalized
/// into the same set, on construction and on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagsRepr")]
pub struct Tags(BTreeSet<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<TagsRepr> for Tags {
    fn from(repr: TagsRepr) -> Self {
        match repr {
            TagsRepr::One(tag) => Self::from(tag),
            TagsRepr::Many(tags) => tags.into_iter().collect(),
        }
    }
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Tags {
    fn from(tag: &str) -> Self {
        Self(BTreeSet::from([tag.to_string()]))
    }
}

impl From<String> for Tags {
    fn from(tag: String) -> Self {
        Self(BTreeSet::from([tag]))
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Vec<&str>> for Tags {
    fn from(tags: Vec<&str>) -> Self {
        tags.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        tags.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A cached query/response pair with its embedding.
///
/// `created_at` is fixed when the entry is built and survives serialization,
/// so a store that rebuilds an entry does not reset its age. Timestamps are
/// kept at microsecond precision and TTLs at millisecond precision so the
/// persisted form round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    query: String,
    #[serde(alias = "vector")]
    embedding: Vec<f32>,
    response: serde_json::Value,
    #[serde(default, alias = "model_hint")]
    model: Option<String>,
    #[serde(default)]
    tags: Tags,
    #[serde(with = "epoch_seconds", alias = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "optional_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    ttl: Option<Duration>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl CacheEntry {
    /// Create a new entry stamped with the current time and no expiry
    pub fn new(
        query: impl Into<String>,
        embedding: Vec<f32>,
        response: serde_json::Value,
    ) -> Self {
        let now = Utc::now();

        Self {
            query: query.into(),
            embedding,
            response,
            model: None,
            tags: Tags::default(),
            created_at: DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now),
            ttl: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Set the time-to-live; `None` means the entry never expires
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.map(|t| Duration::from_millis(t.as_millis() as u64));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the creation time (used when rebuilding an entry from elsewhere)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at =
            DateTime::from_timestamp_micros(created_at.timestamp_micros()).unwrap_or(created_at);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn response(&self) -> &serde_json::Value {
        &self.response
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    /// Check if the entry is expired as of now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expired iff a TTL is set and strictly more than TTL has elapsed since creation
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        match (now - self.created_at).to_std() {
            Ok(elapsed) => elapsed > ttl,
            Err(_) => false,
        }
    }

    /// Time left before expiry, `None` if the entry never expires
    pub fn remaining_ttl(&self) -> Option<Duration> {
        let ttl = self.ttl?;
        let elapsed = (Utc::now() - self.created_at).to_std().unwrap_or_default();
        Some(ttl.saturating_sub(elapsed))
    }

    pub fn to_json(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `DateTime<Utc>` as fractional epoch seconds
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.timestamp_micros() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;

        if !secs.is_finite() {
            return Err(D::Error::custom("created_at must be a finite number"));
        }

        DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
            .ok_or_else(|| D::Error::custom(format!("created_at out of range: {}", secs)))
    }
}

/// `Option<Duration>` as fractional seconds
mod optional_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(ttl) => serializer.serialize_f64(ttl.as_millis() as f64 / 1000.0),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) if !secs.is_finite() || secs < 0.0 => {
                Err(D::Error::custom(format!("ttl must be non-negative, got {}", secs)))
            }
            Some(secs) => Ok(Some(Duration::from_millis((secs * 1000.0).round() as u64))),
            None => Ok(None),
        }
    }
}
