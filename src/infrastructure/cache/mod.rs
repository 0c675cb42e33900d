//! Cache infrastructure - Persistent cache and its backends

mod factory;
mod in_memory;
mod persistent;
mod s3;

pub use factory::{CacheFactory, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use persistent::PersistentCache;
pub use s3::{AwsS3Client, ObjectStoreClient, S3CacheBackend, StoredObject};
