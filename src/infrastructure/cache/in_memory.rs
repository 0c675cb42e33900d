//! Process-local cache backend using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{CacheBackend, CacheEntry};
use crate::domain::DomainError;

/// Configuration for the local backend
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

type EntryKey = (String, String);

/// Evicts each entry at its own expiration instant
struct EntryExpiry;

impl Expiry<EntryKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &EntryKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl_remaining())
    }

    fn expire_after_update(
        &self,
        _key: &EntryKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl_remaining())
    }
}

/// Concurrent in-process map keyed by `(namespace, key)`.
///
/// Nothing survives a restart. moka shards internally, so operations on
/// different pairs do not contend on a single lock.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<EntryKey, CacheEntry>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, config }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    /// Approximate number of live entries
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    fn entry_key(key: &str, namespace: &str) -> EntryKey {
        (namespace.to_string(), key.to_string())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str, namespace: &str) -> Result<Option<CacheEntry>, DomainError> {
        Ok(self.cache.get(&Self::entry_key(key, namespace)).await)
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), DomainError> {
        let entry_key = Self::entry_key(&entry.key, &entry.namespace);
        self.cache.insert(entry_key, entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str, namespace: &str) -> Result<(), DomainError> {
        self.cache.invalidate(&Self::entry_key(key, namespace)).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
