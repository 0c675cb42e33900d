//! Uniform persistent cache contract over any backend

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::cache::{CacheBackend, CacheEntry, CacheLookup, CacheMetadata};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    CacheLookupResult, record_cache_lookup, record_cache_write,
};

/// Namespaced key/value store with TTL expiration.
///
/// `get` never fails: missing, expired and unreadable entries are all misses.
/// `put` and `delete` surface failures so read-through callers can ignore them.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    backend: Arc<dyn CacheBackend>,
}

impl PersistentCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub async fn get(&self, key: &str, namespace: &str) -> CacheLookup {
        let backend = self.backend.backend_name();

        match self.backend.get(key, namespace).await {
            Ok(Some(entry)) if !entry.is_expired() => {
                record_cache_lookup(backend, CacheLookupResult::Hit);
                CacheLookup::hit(entry)
            }
            Ok(_) => {
                record_cache_lookup(backend, CacheLookupResult::Miss);
                CacheLookup::miss(key, namespace)
            }
            Err(e) => {
                warn!(backend, key = %key, namespace = %namespace, error = %e, "Cache read failed, treating as miss");
                record_cache_lookup(backend, CacheLookupResult::Error);
                CacheLookup::miss(key, namespace)
            }
        }
    }

    /// Like `get`, but reports backend failures instead of degrading.
    /// Used by readiness probes.
    pub async fn probe(&self, key: &str, namespace: &str) -> Result<bool, DomainError> {
        Ok(self.backend.get(key, namespace).await?.is_some())
    }

    pub async fn put(
        &self,
        key: &str,
        namespace: &str,
        data: Bytes,
        metadata: Option<CacheMetadata>,
        expiration: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        Self::validate(key, namespace)?;

        let entry = CacheEntry::new(key, namespace, data, expiration)
            .with_metadata(metadata.unwrap_or_default());
        let size = entry.data.len();

        let result = self.backend.put(entry).await;
        record_cache_write(self.backend.backend_name(), result.is_ok());

        match &result {
            Ok(()) => debug!(key = %key, namespace = %namespace, size, "Cache entry stored"),
            Err(e) => warn!(key = %key, namespace = %namespace, error = %e, "Cache write failed"),
        }

        result.map_err(|e| match e {
            DomainError::CacheWriteFailed { .. } => e,
            other => DomainError::cache_write(other.to_string()),
        })
    }

    pub async fn delete(&self, key: &str, namespace: &str) -> Result<(), DomainError> {
        Self::validate(key, namespace)?;

        let result = self.backend.delete(key, namespace).await;
        record_cache_write(self.backend.backend_name(), result.is_ok());

        if let Err(e) = &result {
            warn!(key = %key, namespace = %namespace, error = %e, "Cache delete failed");
        }

        result
    }

    fn validate(key: &str, namespace: &str) -> Result<(), DomainError> {
        if key.is_empty() || namespace.is_empty() {
            return Err(DomainError::validation(
                "Cache key and namespace must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheBackend;
    use crate::infrastructure::cache::InMemoryCache;

    fn in_future(secs: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(secs)
    }

    fn metadata() -> CacheMetadata {
        let mut metadata = CacheMetadata::new();
        metadata.insert("status".to_string(), "200".to_string());
        metadata
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let cache = PersistentCache::new(Arc::new(InMemoryCache::new()));

        cache
            .put("page", "render", Bytes::from("body"), Some(metadata()), in_future(60))
            .await
            .unwrap();

        let lookup = cache.get("page", "render").await;
        assert!(lookup.found);
        assert_eq!(lookup.data, Some(Bytes::from("body")));
        assert_eq!(lookup.metadata, Some(metadata()));
        assert_eq!(lookup.key, "page");
        assert_eq!(lookup.namespace, "render");
    }

    #[tokio::test]
    async fn test_past_expiration_is_a_miss() {
        let backend = MockCacheBackend::new().with_entry(
            CacheEntry::new("k", "ns", "v", Utc::now() - chrono::Duration::seconds(1)),
        );
        let cache = PersistentCache::new(Arc::new(backend));

        let lookup = cache.get("k", "ns").await;
        assert!(!lookup.found);
        assert!(lookup.data.is_none());
        assert!(lookup.metadata.is_none());
    }

    #[tokio::test]
    async fn test_delete_then_get_is_a_miss() {
        let cache = PersistentCache::new(Arc::new(InMemoryCache::new()));
        cache
            .put("k", "ns", Bytes::from("v"), None, in_future(60))
            .await
            .unwrap();

        cache.delete("k", "ns").await.unwrap();
        cache.delete("k", "ns").await.unwrap();

        assert!(!cache.get("k", "ns").await.found);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_get_to_miss() {
        let cache = PersistentCache::new(Arc::new(MockCacheBackend::new().with_error("down")));

        let lookup = cache.get("k", "ns").await;
        assert!(!lookup.found);
        assert!(cache.probe("k", "ns").await.is_err());
    }

    #[tokio::test]
    async fn test_backend_failure_rejects_put_and_delete() {
        let cache = PersistentCache::new(Arc::new(MockCacheBackend::new().with_error("down")));

        let put = cache.put("k", "ns", Bytes::new(), None, in_future(60)).await;
        assert!(matches!(put, Err(DomainError::CacheWriteFailed { .. })));

        let delete = cache.delete("k", "ns").await;
        assert!(delete.is_err());
    }

    #[tokio::test]
    async fn test_zero_length_payload_round_trip() {
        let cache = PersistentCache::new(Arc::new(InMemoryCache::new()));

        cache.put("k", "ns", Bytes::new(), None, in_future(60)).await.unwrap();

        let lookup = cache.get("k", "ns").await;
        assert!(lookup.found);
        assert_eq!(lookup.data, Some(Bytes::new()));
        assert_eq!(lookup.metadata, Some(CacheMetadata::new()));
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let cache = PersistentCache::new(Arc::new(InMemoryCache::new()));

        let result = cache.put("", "ns", Bytes::new(), None, in_future(60)).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_overwrite_is_observed() {
        let cache = PersistentCache::new(Arc::new(InMemoryCache::new()));
        cache.put("k", "ns", Bytes::from("one"), None, in_future(60)).await.unwrap();
        cache.put("k", "ns", Bytes::from("two"), None, in_future(120)).await.unwrap();

        let lookup = cache.get("k", "ns").await;
        assert_eq!(lookup.data, Some(Bytes::from("two")));
        let remaining = (lookup.expiration.unwrap() - Utc::now()).num_seconds();
        assert!(remaining > 100);
    }
}
