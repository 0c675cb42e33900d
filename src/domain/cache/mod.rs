//! Cache domain - persistent cache entries, keys and cacheability

mod entry;
mod key;
mod policy;
mod repository;

pub use entry::{CacheEntry, CacheLookup, CacheMetadata};
pub use key::RequestFingerprint;
pub use policy::{CacheCandidate, CacheControl, CachePolicy, DefaultCachePolicy};
pub use repository::CacheBackend;

#[cfg(test)]
pub use repository::mock::MockCacheBackend;
