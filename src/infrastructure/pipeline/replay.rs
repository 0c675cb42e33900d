//! Encoding of response status and headers into cache metadata

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::domain::cache::{CacheLookup, CacheMetadata};

/// Response header reporting whether the pipeline served from cache
pub const CACHE_STATUS_HEADER: &str = "x-edge-cache";

const STATUS_FIELD: &str = "status";
const HEADER_FIELD_PREFIX: &str = "header:";

/// Response headers stored with a cached payload and replayed on a hit
const REPLAYED_HEADERS: &[&str] = &[
    "cache-control",
    "content-encoding",
    "content-language",
    "content-type",
    "etag",
    "last-modified",
    "vary",
];

/// A response ready to be cached or replayed
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StoredResponse {
    /// Metadata carrying the status and whitelisted headers
    pub fn metadata(&self) -> CacheMetadata {
        let mut metadata = CacheMetadata::new();
        metadata.insert(STATUS_FIELD.to_string(), self.status.as_u16().to_string());

        for name in REPLAYED_HEADERS {
            if let Some(value) = self.headers.get(*name).and_then(|v| v.to_str().ok()) {
                metadata.insert(format!("{}{}", HEADER_FIELD_PREFIX, name), value.to_string());
            }
        }

        metadata
    }

    /// Rebuilds a response from a cache hit. `None` for a miss.
    pub fn from_lookup(lookup: CacheLookup) -> Option<Self> {
        if !lookup.found {
            return None;
        }

        let metadata = lookup.metadata.unwrap_or_default();

        let status = metadata
            .get(STATUS_FIELD)
            .and_then(|s| s.parse::<u16>().ok())
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::OK);

        let mut headers = HeaderMap::new();
        for (field, value) in &metadata {
            let Some(name) = field.strip_prefix(HEADER_FIELD_PREFIX) else {
                continue;
            };

            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        Some(Self {
            status,
            headers,
            body: lookup.data.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheEntry;
    use chrono::Utc;
    use http::header::{CONTENT_TYPE, SET_COOKIE};

    fn response() -> StoredResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        headers.insert(SET_COOKIE, HeaderValue::from_static("a=b"));
        headers.insert("x-upstream-debug", HeaderValue::from_static("1"));

        StoredResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from("<html></html>"),
        }
    }

    #[test]
    fn test_metadata_keeps_only_whitelisted_headers() {
        let metadata = response().metadata();

        assert_eq!(metadata.get("status").unwrap(), "200");
        assert_eq!(
            metadata.get("header:content-type").unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_replay_from_hit() {
        let original = response();
        let entry = CacheEntry::new("k", "ns", original.body.clone(), Utc::now())
            .with_metadata(original.metadata());

        let replayed = StoredResponse::from_lookup(CacheLookup::hit(entry)).unwrap();

        assert_eq!(replayed.status, StatusCode::OK);
        assert_eq!(replayed.body, original.body);
        assert_eq!(
            replayed.headers.get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert!(replayed.headers.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_miss_has_nothing_to_replay() {
        assert!(StoredResponse::from_lookup(CacheLookup::miss("k", "ns")).is_none());
    }
}
