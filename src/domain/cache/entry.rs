//! Cache entry and lookup result types

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Caller-supplied side-channel data stored with an entry
pub type CacheMetadata = BTreeMap<String, String>;

/// A single cached payload identified by `(key, namespace)`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub namespace: String,
    pub data: Bytes,
    pub metadata: CacheMetadata,
    pub expiration: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        namespace: impl Into<String>,
        data: impl Into<Bytes>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.into(),
            data: data.into(),
            metadata: CacheMetadata::new(),
            expiration,
        }
    }

    /// Creates an entry that expires `ttl` from now
    pub fn with_ttl(
        key: impl Into<String>,
        namespace: impl Into<String>,
        data: impl Into<Bytes>,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self::new(key, namespace, data, Utc::now() + ttl)
    }

    pub fn with_metadata(mut self, metadata: CacheMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left before expiry, zero once expired
    pub fn ttl_remaining(&self) -> Duration {
        (self.expiration - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Result of a cache read. `found = false` is the normal miss signal.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub key: String,
    pub namespace: String,
    pub found: bool,
    pub data: Option<Bytes>,
    pub metadata: Option<CacheMetadata>,
    pub expiration: Option<DateTime<Utc>>,
}

impl CacheLookup {
    pub fn hit(entry: CacheEntry) -> Self {
        Self {
            key: entry.key,
            namespace: entry.namespace,
            found: true,
            data: Some(entry.data),
            metadata: Some(entry.metadata),
            expiration: Some(entry.expiration),
        }
    }

    pub fn miss(key: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.into(),
            found: false,
            data: None,
            metadata: None,
            expiration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry() {
        let past = CacheEntry::new("k", "ns", "v", Utc::now() - chrono::Duration::seconds(1));
        assert!(past.is_expired());
        assert_eq!(past.ttl_remaining(), Duration::ZERO);

        let future = CacheEntry::with_ttl("k", "ns", "v", Duration::from_secs(60));
        assert!(!future.is_expired());
        assert!(future.ttl_remaining().as_secs() > 50);
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let mut metadata = CacheMetadata::new();
        metadata.insert("status".to_string(), "200".to_string());

        let entry = CacheEntry::with_ttl("page", "render", "<html/>", Duration::from_secs(60))
            .with_metadata(metadata.clone());
        let hit = CacheLookup::hit(entry);

        assert!(hit.found);
        assert_eq!(hit.data, Some(Bytes::from("<html/>")));
        assert_eq!(hit.metadata, Some(metadata));

        let miss = CacheLookup::miss("page", "render");
        assert!(!miss.found);
        assert!(miss.data.is_none());
        assert!(miss.metadata.is_none());
        assert_eq!(miss.key, "page");
        assert_eq!(miss.namespace, "render");
    }
}
