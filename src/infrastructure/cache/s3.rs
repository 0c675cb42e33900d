//! Remote cache backend on an S3-compatible object store

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use tracing::warn;
use url::form_urlencoded;

use crate::domain::cache::{CacheBackend, CacheEntry, CacheMetadata};
use crate::domain::DomainError;

/// User-metadata field holding the expiration as epoch milliseconds
pub const EXPIRATION_FIELD: &str = "expiration";
/// User-metadata field holding caller metadata as a JSON object
pub const METADATA_FIELD: &str = "metadata";

/// One stored object: raw body plus user metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub metadata: HashMap<String, String>,
}

/// Trait for object store operations (for mocking)
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + std::fmt::Debug {
    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, DomainError>;

    async fn put_object(&self, key: &str, object: StoredObject) -> Result<(), DomainError>;

    async fn delete_object(&self, key: &str) -> Result<(), DomainError>;
}

/// Real S3 client wrapper bound to one bucket
#[derive(Debug, Clone)]
pub struct AwsS3Client {
    client: S3Client,
    bucket: String,
}

impl AwsS3Client {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a client from the default AWS credential chain
    pub async fn from_env(
        bucket: impl Into<String>,
        endpoint: Option<&str>,
        region: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(region) = region {
            builder = builder.region(aws_sdk_s3::config::Region::new(region.to_string()));
        }

        Self::new(S3Client::from_conf(builder.build()), bucket)
    }
}

#[async_trait]
impl ObjectStoreClient for AwsS3Client {
    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, DomainError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }

                return Err(DomainError::cache_unavailable(format!(
                    "S3 get_object failed: {}",
                    err
                )));
            }
        };

        let metadata = output.metadata().cloned().unwrap_or_default();
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| DomainError::cache_unavailable(format!("S3 body read failed: {}", e)))?
            .into_bytes();

        Ok(Some(StoredObject { body, metadata }))
    }

    async fn put_object(&self, key: &str, object: StoredObject) -> Result<(), DomainError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(object.body))
            .set_metadata(Some(object.metadata))
            .send()
            .await
            .map_err(|e| DomainError::cache_write(format!("S3 put_object failed: {}", e)))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), DomainError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DomainError::cache_write(format!("S3 delete_object failed: {}", e)))?;

        Ok(())
    }
}

/// Cache backend storing each entry as one object under `prefix/namespace/key`
#[derive(Debug)]
pub struct S3CacheBackend<C: ObjectStoreClient> {
    client: C,
    prefix: String,
}

impl<C: ObjectStoreClient> S3CacheBackend<C> {
    pub fn new(client: C, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Object key for a pair. Each segment is form-urlencoded, so `/` inside
    /// a namespace or key can never alias another pair.
    pub fn object_key(&self, key: &str, namespace: &str) -> String {
        let encode = |s: &str| form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        let object = format!("{}/{}", encode(namespace), encode(key));

        if self.prefix.is_empty() {
            object
        } else {
            format!("{}/{}", self.prefix, object)
        }
    }

    fn to_object(entry: CacheEntry) -> Result<StoredObject, DomainError> {
        let metadata_json = serde_json::to_string(&entry.metadata)
            .map_err(|e| DomainError::cache_write(format!("Failed to serialize metadata: {}", e)))?;

        let mut metadata = HashMap::new();
        metadata.insert(
            EXPIRATION_FIELD.to_string(),
            entry.expiration.timestamp_millis().to_string(),
        );
        metadata.insert(METADATA_FIELD.to_string(), metadata_json);

        Ok(StoredObject {
            body: entry.data,
            metadata,
        })
    }

    fn from_object(key: &str, namespace: &str, object: StoredObject) -> Option<CacheEntry> {
        let expiration = object
            .metadata
            .get(EXPIRATION_FIELD)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        let Some(expiration) = expiration else {
            warn!(key = %key, namespace = %namespace, "Cached object has no valid expiration, ignoring");
            return None;
        };

        let metadata: CacheMetadata = match object.metadata.get(METADATA_FIELD) {
            Some(json) => match serde_json::from_str(json) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(key = %key, namespace = %namespace, error = %e, "Cached object has corrupt metadata, ignoring");
                    return None;
                }
            },
            None => CacheMetadata::new(),
        };

        Some(CacheEntry::new(key, namespace, object.body, expiration).with_metadata(metadata))
    }
}

#[async_trait]
impl<C: ObjectStoreClient + 'static> CacheBackend for S3CacheBackend<C> {
    async fn get(&self, key: &str, namespace: &str) -> Result<Option<CacheEntry>, DomainError> {
        let object_key = self.object_key(key, namespace);

        Ok(self
            .client
            .get_object(&object_key)
            .await?
            .and_then(|object| Self::from_object(key, namespace, object))
            .filter(|entry| !entry.is_expired()))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), DomainError> {
        let object_key = self.object_key(&entry.key, &entry.namespace);
        let object = Self::to_object(entry)?;

        self.client.put_object(&object_key, object).await
    }

    async fn delete(&self, key: &str, namespace: &str) -> Result<(), DomainError> {
        self.client.delete_object(&self.object_key(key, namespace)).await
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockObjectStoreClient;
    use super::*;
    use std::time::Duration;

    fn backend() -> S3CacheBackend<MockObjectStoreClient> {
        S3CacheBackend::new(MockObjectStoreClient::new(), "/edge-cache/")
    }

    fn entry() -> CacheEntry {
        let mut metadata = CacheMetadata::new();
        metadata.insert("status".to_string(), "200".to_string());
        metadata.insert("content-type".to_string(), "text/html".to_string());

        CacheEntry::with_ttl("page/1", "render/PHONE", "<html/>", Duration::from_secs(60))
            .with_metadata(metadata)
    }

    #[test]
    fn test_object_key_encodes_segments() {
        let backend = backend();

        assert_eq!(backend.object_key("page/1", "render"), "edge-cache/render/page%2F1");
        assert_ne!(
            backend.object_key("b", "a/x"),
            backend.object_key("x/b", "a")
        );
    }

    #[tokio::test]
    async fn test_put_stores_expiration_and_metadata() {
        let backend = backend();
        let entry = entry();

        backend.put(entry.clone()).await.unwrap();

        let object = backend
            .client
            .object(&backend.object_key(&entry.key, &entry.namespace))
            .unwrap();
        assert_eq!(object.body, Bytes::from("<html/>"));
        assert_eq!(
            object.metadata.get(EXPIRATION_FIELD).unwrap(),
            &entry.expiration.timestamp_millis().to_string()
        );
        assert!(object.metadata.get(METADATA_FIELD).unwrap().contains("text/html"));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let backend = backend();
        let entry = entry();

        backend.put(entry.clone()).await.unwrap();

        let result = backend.get(&entry.key, &entry.namespace).await.unwrap().unwrap();
        assert_eq!(result.data, entry.data);
        assert_eq!(result.metadata, entry.metadata);
        assert_eq!(
            result.expiration.timestamp_millis(),
            entry.expiration.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_expired_object_is_a_miss() {
        let backend = backend();
        let expired = CacheEntry::new("k", "ns", "v", Utc::now() - chrono::Duration::seconds(5));

        backend.put(expired).await.unwrap();

        assert!(backend.get("k", "ns").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_object_without_expiration_is_a_miss() {
        let backend = backend();
        backend.client.insert(
            &backend.object_key("k", "ns"),
            StoredObject {
                body: Bytes::from("v"),
                metadata: HashMap::new(),
            },
        );

        assert!(backend.get("k", "ns").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let backend = backend();

        backend.delete("missing", "ns").await.unwrap();
        backend.delete("missing", "ns").await.unwrap();
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let backend = S3CacheBackend::new(MockObjectStoreClient::new().with_error("timeout"), "");

        assert!(matches!(
            backend.get("k", "ns").await,
            Err(DomainError::CacheBackendUnavailable { .. })
        ));
        assert!(matches!(
            backend.put(entry()).await,
            Err(DomainError::CacheWriteFailed { .. })
        ));
    }
}
