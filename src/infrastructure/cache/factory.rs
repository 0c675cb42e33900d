//! Cache factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::config::CacheSettings;
use crate::domain::cache::CacheBackend;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::persistent::PersistentCache;
use super::s3::{AwsS3Client, S3CacheBackend};

/// Supported cache backends
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CacheType {
    /// Process-local map, lost on restart
    #[default]
    Local,
    /// One object per entry in an S3 bucket
    S3,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::Local => write!(f, "local"),
            CacheType::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "in_memory" | "memory" => Ok(CacheType::Local),
            "s3" => Ok(CacheType::S3),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache backend: {}. Valid backends: local, s3",
                s
            ))),
        }
    }
}

/// Factory for creating the persistent cache
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Creates a cache according to configuration
    pub async fn create(&self, settings: &CacheSettings) -> Result<PersistentCache, DomainError> {
        let backend: Arc<dyn CacheBackend> = match settings.backend.parse::<CacheType>()? {
            CacheType::Local => Arc::new(InMemoryCache::with_config(
                InMemoryCacheConfig::default().with_max_capacity(settings.max_capacity),
            )),
            CacheType::S3 => {
                let bucket = settings.s3.bucket.clone().ok_or_else(|| {
                    DomainError::configuration("cache.s3.bucket is required for the s3 backend")
                })?;

                let client = AwsS3Client::from_env(
                    bucket.clone(),
                    settings.s3.endpoint.as_deref(),
                    settings.s3.region.as_deref(),
                    settings.s3.force_path_style,
                )
                .await;

                info!(bucket = %bucket, prefix = %settings.s3.prefix, "Using S3 cache backend");
                Arc::new(S3CacheBackend::new(client, settings.s3.prefix.clone()))
            }
        };

        info!(backend = backend.backend_name(), "Persistent cache created");
        Ok(PersistentCache::new(backend))
    }
}
