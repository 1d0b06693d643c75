//! Redis semantic cache store

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, warn};

use crate::domain::semantic_cache::{CacheEntry, CacheStore, Tags};
use crate::domain::CacheError;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Prefix scoping every key this store touches
    pub namespace: String,
    /// Maximum number of entries; `None` means unbounded
    pub max_size: Option<usize>,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "semantic_cache".to_string(),
            max_size: None,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size.max(1));
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Key layout inside one namespace:
/// `{ns}:entry:{key}` holds the serialized entry,
/// `{ns}:tag:{tag}` is the set of keys carrying a tag,
/// `{ns}:keys` is the set of every tracked key.
#[derive(Debug, Clone)]
struct RedisKeys {
    namespace: String,
}

impl RedisKeys {
    fn entry(&self, key: &str) -> String {
        format!("{}:entry:{}", self.namespace, key)
    }

    fn tag(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.namespace, tag)
    }

    fn keys(&self) -> String {
        format!("{}:keys", self.namespace)
    }

    /// SCAN pattern for one key family, with the namespace matched literally
    fn pattern(&self, family: &str) -> String {
        format!("{}:{}:*", escape_glob(&self.namespace), family)
    }
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn redis_error(action: &str, e: RedisError) -> CacheError {
    CacheError::store(format!("Failed to {}: {}", action, e))
}

/// Redis-backed store shared across processes.
///
/// Entry expiry uses native key expiry; the key and tag sets are secondary
/// indices cleaned up lazily when a scan finds a vanished entry. Each Redis
/// command is atomic, but "check size, evict, write" is not transactional
/// across processes: concurrent writers may briefly overshoot `max_size`.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
    keys: RedisKeys,
}

impl fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheStore {
    /// Connect to Redis
    pub async fn new(config: RedisStoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::store(format!("Failed to create Redis client: {}", e)))?;

        let connection =
            tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
                .await
                .map_err(|_| CacheError::timed_out("redis connect", config.connection_timeout))?
                .map_err(|e| CacheError::store(format!("Failed to connect to Redis: {}", e)))?;

        let keys = RedisKeys {
            namespace: config.namespace.clone(),
        };

        Ok(Self {
            connection,
            config,
            keys,
        })
    }

    async fn load(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let raw: Option<String> = conn
            .get(self.keys.entry(key))
            .await
            .map_err(|e| redis_error(&format!("get entry '{}'", key), e))?;

        match raw {
            Some(json) => Ok(Some(CacheEntry::from_json(&json)?)),
            None => Ok(None),
        }
    }

    /// Load every live entry sorted by key, dropping index members whose
    /// entry vanished, expired or no longer decodes
    async fn scan_live(
        &self,
        conn: &mut ConnectionManager,
    ) -> Result<Vec<(String, CacheEntry)>, CacheError> {
        let mut keys: Vec<String> = conn
            .smembers(self.keys.keys())
            .await
            .map_err(|e| redis_error("list keys", e))?;

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        keys.sort();

        let entry_keys: Vec<String> = keys.iter().map(|k| self.keys.entry(k)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&entry_keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| redis_error("load entries", e))?;

        let mut live = Vec::with_capacity(keys.len());
        let mut stale: Vec<(String, Option<Tags>)> = Vec::new();

        for (key, value) in keys.into_iter().zip(values) {
            let Some(json) = value else {
                stale.push((key, None));
                continue;
            };

            match CacheEntry::from_json(&json) {
                Ok(entry) if entry.is_expired() => {
                    let tags = entry.tags().clone();
                    stale.push((key, Some(tags)));
                }
                Ok(entry) => live.push((key, entry)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping undecodable semantic cache entry");
                    stale.push((key, None));
                }
            }
        }

        if !stale.is_empty() {
            let mut pipe = redis::pipe();
            for (key, tags) in &stale {
                pipe.del(self.keys.entry(key)).ignore();
                pipe.srem(self.keys.keys(), key).ignore();
                for tag in tags.iter().flat_map(|t| t.iter()) {
                    pipe.srem(self.keys.tag(tag), key).ignore();
                }
            }

            pipe.query_async::<()>(&mut *conn)
                .await
                .map_err(|e| redis_error("purge stale entries", e))?;

            debug!(count = stale.len(), "Purged stale semantic cache entries");
        }

        Ok(live)
    }

    /// Remove one entry and its index memberships; returns whether it existed
    async fn remove(&self, conn: &mut ConnectionManager, key: &str) -> Result<bool, CacheError> {
        let raw: Option<String> = conn
            .get(self.keys.entry(key))
            .await
            .map_err(|e| redis_error(&format!("get entry '{}'", key), e))?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(self.keys.entry(key)).ignore();
        pipe.srem(self.keys.keys(), key).ignore();

        if let Some(entry) = raw.as_deref().and_then(|json| CacheEntry::from_json(json).ok()) {
            for tag in entry.tags().iter() {
                pipe.srem(self.keys.tag(tag), key).ignore();
            }
        }

        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| redis_error(&format!("delete entry '{}'", key), e))?;

        Ok(raw.is_some())
    }

    async fn delete_pattern(
        &self,
        conn: &mut ConnectionManager,
        pattern: &str,
    ) -> Result<usize, CacheError> {
        // SCAN rather than KEYS so large namespaces do not block the server
        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await
                .map_err(|e| redis_error(&format!("scan keys with pattern '{}'", pattern), e))?;

            if !keys.is_empty() {
                let deleted: usize = conn
                    .del(&keys)
                    .await
                    .map_err(|e| redis_error("delete keys", e))?;
                total_deleted += deleted;
            }

            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn write(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let json = entry.to_json()?;

        let exists: bool = conn
            .sismember(self.keys.keys(), key)
            .await
            .map_err(|e| redis_error("check key membership", e))?;

        let previous_tags = if exists {
            self.load(&mut conn, key)
                .await?
                .map(|previous| previous.tags().clone())
        } else {
            None
        };

        if let Some(max_size) = self.config.max_size {
            if !exists {
                let live = self.scan_live(&mut conn).await?;

                if live.len() >= max_size {
                    // Sorted by key, so the first minimum is deterministic
                    let oldest = live
                        .iter()
                        .min_by_key(|(_, e)| e.created_at())
                        .map(|(k, _)| k.clone());

                    if let Some(oldest) = oldest {
                        self.remove(&mut conn, &oldest).await?;
                        debug!(key = %oldest, "Evicted oldest semantic cache entry");
                    }
                }
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic();

        for tag in previous_tags.iter().flat_map(|t| t.iter()) {
            pipe.srem(self.keys.tag(tag), key).ignore();
        }

        match entry.remaining_ttl() {
            Some(remaining) => {
                let millis = (remaining.as_millis() as u64).max(1);
                pipe.cmd("SET")
                    .arg(self.keys.entry(key))
                    .arg(&json)
                    .arg("PX")
                    .arg(millis)
                    .ignore();
            }
            None => {
                pipe.set(self.keys.entry(key), &json).ignore();
            }
        }

        pipe.sadd(self.keys.keys(), key).ignore();
        for tag in entry.tags().iter() {
            pipe.sadd(self.keys.tag(tag), key).ignore();
        }

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error(&format!("write entry '{}'", key), e))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection.clone();

        match self.load(&mut conn, key).await? {
            Some(entry) if entry.is_expired() => {
                self.remove(&mut conn, key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>, CacheError> {
        let mut conn = self.connection.clone();
        self.scan_live(&mut conn).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        self.remove(&mut conn, key).await
    }

    async fn invalidate_by_tags(&self, tags: &Tags) -> Result<usize, CacheError> {
        let mut conn = self.connection.clone();
        let mut keys = BTreeSet::new();

        for tag in tags.iter() {
            let members: Vec<String> = conn
                .smembers(self.keys.tag(tag))
                .await
                .map_err(|e| redis_error(&format!("list tag '{}'", tag), e))?;
            keys.extend(members);
        }

        let mut removed = 0;
        for key in &keys {
            if self.remove(&mut conn, key).await? {
                removed += 1;
            }
        }

        let tag_keys: Vec<String> = tags.iter().map(|t| self.keys.tag(t)).collect();
        if !tag_keys.is_empty() {
            let _: usize = conn
                .del(&tag_keys)
                .await
                .map_err(|e| redis_error("delete tag indices", e))?;
        }

        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        self.delete_pattern(&mut conn, &self.keys.pattern("entry")).await?;
        self.delete_pattern(&mut conn, &self.keys.pattern("tag")).await?;

        let _: usize = conn
            .del(self.keys.keys())
            .await
            .map_err(|e| redis_error("delete key index", e))?;

        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        let mut conn = self.connection.clone();

        conn.scard(self.keys.keys())
            .await
            .map_err(|e| redis_error("count keys", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    // These tests require a running Redis instance:
    // cargo test -- --ignored

    async fn test_store(namespace: &str, max_size: Option<usize>) -> RedisCacheStore {
        let mut config = RedisStoreConfig::new("redis://127.0.0.1:6379").with_namespace(namespace);
        if let Some(max) = max_size {
            config = config.with_max_size(max);
        }

        let store = RedisCacheStore::new(config).await.unwrap();
        store.clear().await.unwrap();
        store
    }

    fn create_entry(query: &str) -> CacheEntry {
        CacheEntry::new(query, vec![1.0, 0.0], serde_json::json!(query))
    }

    #[test]
    fn test_key_layout() {
        let keys = RedisKeys {
            namespace: "ns".to_string(),
        };

        assert_eq!(keys.entry("abc"), "ns:entry:abc");
        assert_eq!(keys.tag("faq"), "ns:tag:faq");
        assert_eq!(keys.keys(), "ns:keys");
        assert_eq!(keys.pattern("tag"), "ns:tag:*");
    }

    #[test]
    fn test_pattern_escapes_namespace_globs() {
        let keys = RedisKeys {
            namespace: "team*[a]?".to_string(),
        };

        assert_eq!(keys.pattern("entry"), r"team\*\[a\]\?:entry:*");
        assert_eq!(keys.entry("k"), "team*[a]?:entry:k");
    }

    #[test]
    fn test_config_builder() {
        let config = RedisStoreConfig::new("redis://localhost")
            .with_namespace("app")
            .with_max_size(10)
            .with_connection_timeout(Duration::from_secs(1));

        assert_eq!(config.namespace, "app");
        assert_eq!(config.max_size, Some(10));
        assert_eq!(config.connection_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_error() {
        let config = RedisStoreConfig::new("redis://127.0.0.1:1")
            .with_connection_timeout(Duration::from_millis(500));

        let result = RedisCacheStore::new(config).await;

        assert!(matches!(
            result,
            Err(CacheError::Store { .. }) | Err(CacheError::TimedOut { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_write_get_delete() {
        let store = test_store("semcache-test-basic", None).await;

        store.write("k1", create_entry("q1").with_tags("t")).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap().unwrap().query(), "q1");
        assert_eq!(store.size().await.unwrap(), 1);

        assert!(store.delete("k1").await.unwrap());
        assert!(!store.delete("k1").await.unwrap());
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_round_trip_keeps_created_at() {
        let store = test_store("semcache-test-roundtrip", None).await;
        let entry = create_entry("q").with_created_at(Utc::now() - TimeDelta::seconds(30));

        store.write("k", entry.clone()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap(), entry);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_eviction_by_created_at() {
        let store = test_store("semcache-test-evict", Some(2)).await;
        let now = Utc::now();

        store
            .write("b", create_entry("b").with_created_at(now - TimeDelta::seconds(50)))
            .await
            .unwrap();
        store
            .write("a", create_entry("a").with_created_at(now - TimeDelta::seconds(10)))
            .await
            .unwrap();
        store.write("c", create_entry("c")).await.unwrap();

        assert_eq!(store.size().await.unwrap(), 2);
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("a").await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_eviction_tie_goes_to_smallest_key() {
        let store = test_store("semcache-test-evict-tie", Some(2)).await;
        let created = Utc::now() - TimeDelta::seconds(60);

        // Written in reverse key order so insertion order cannot decide the tie
        store
            .write("zeta", create_entry("zeta").with_created_at(created))
            .await
            .unwrap();
        store
            .write("alpha", create_entry("alpha").with_created_at(created))
            .await
            .unwrap();
        store.write("new", create_entry("new")).await.unwrap();

        assert_eq!(store.size().await.unwrap(), 2);
        assert!(store.get("alpha").await.unwrap().is_none());
        assert!(store.get("zeta").await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_overwrite_moves_tag_membership() {
        let store = test_store("semcache-test-retag", None).await;

        store.write("a", create_entry("a").with_tags("old")).await.unwrap();
        store.write("a", create_entry("a").with_tags("new")).await.unwrap();

        assert_eq!(store.invalidate_by_tags(&"old".into()).await.unwrap(), 0);
        assert_eq!(store.invalidate_by_tags(&"new".into()).await.unwrap(), 1);
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_overwrite_never_evicts() {
        let store = test_store("semcache-test-overwrite", Some(2)).await;

        store.write("a", create_entry("a")).await.unwrap();
        store.write("b", create_entry("b")).await.unwrap();
        store.write("a", create_entry("a2")).await.unwrap();

        assert_eq!(store.size().await.unwrap(), 2);
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_invalidate_by_tags() {
        let store = test_store("semcache-test-tags", None).await;

        store.write("a", create_entry("a").with_tags("x")).await.unwrap();
        store.write("b", create_entry("b").with_tags(["y", "z"])).await.unwrap();
        store.write("c", create_entry("c")).await.unwrap();

        let removed = store.invalidate_by_tags(&Tags::from(["x", "y"])).await.unwrap();

        assert_eq!(removed, 2);
        let keys: Vec<String> = store.entries().await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["c"]);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_native_expiry_purges_index() {
        let store = test_store("semcache-test-expiry", None).await;

        store
            .write("short", create_entry("short").with_ttl(Some(Duration::from_millis(50))))
            .await
            .unwrap();
        store.write("long", create_entry("long")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.size().await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_clear() {
        let store = test_store("semcache-test-clear", None).await;

        store.write("a", create_entry("a").with_tags("t")).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.size().await.unwrap(), 0);
        assert_eq!(store.invalidate_by_tags(&"t".into()).await.unwrap(), 0);
    }
}
