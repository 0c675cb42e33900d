//! Cache backend trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use super::CacheEntry;
use crate::domain::DomainError;

/// Storage strategy behind the persistent cache.
///
/// Backends store and return raw entries; expiry and error degradation are
/// applied uniformly by `PersistentCache` on top of them.
#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    /// Reads an entry. A missing entry is `Ok(None)`, never an error.
    async fn get(&self, key: &str, namespace: &str) -> Result<Option<CacheEntry>, DomainError>;

    /// Stores an entry, overwriting any previous entry for the same pair
    async fn put(&self, entry: CacheEntry) -> Result<(), DomainError>;

    /// Removes an entry. Removing a missing entry succeeds.
    async fn delete(&self, key: &str, namespace: &str) -> Result<(), DomainError>;

    /// Backend name for logging/metrics
    fn backend_name(&self) -> &'static str;
}
