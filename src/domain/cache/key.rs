//! Cache key derivation from request identity

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::domain::device::DeviceType;

/// Request identity that a cached response is keyed on.
///
/// Query parameters and vary headers are kept sorted so that equivalent
/// requests produce the same key regardless of parameter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFingerprint {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub device: DeviceType,
    pub vary: BTreeMap<String, String>,
}

impl RequestFingerprint {
    pub fn new(method: impl Into<String>, path: impl Into<String>, device: DeviceType) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            query: Vec::new(),
            device,
            vary: BTreeMap::new(),
        }
    }

    /// Adds the parameters of a raw query string, skipping ignored names
    pub fn with_query(mut self, query: Option<&str>, ignored: &[String]) -> Self {
        if let Some(query) = query {
            self.query.extend(
                form_urlencoded::parse(query.as_bytes())
                    .filter(|(name, _)| !ignored.iter().any(|i| i == name.as_ref()))
                    .map(|(name, value)| (name.into_owned(), value.into_owned())),
            );
            self.query.sort();
        }
        self
    }

    /// Adds a header value the cached response varies on
    pub fn with_vary(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vary.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Canonical, human-readable form of the fingerprint
    pub fn canonical(&self) -> String {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();

        let mut parts = vec![
            self.method.clone(),
            format!("{}?{}", self.path, query),
            format!("device={}", self.device),
        ];

        for (name, value) in &self.vary {
            parts.push(format!("{}={}", name, value));
        }

        parts.join("|")
    }

    /// Stable cache key: hex SHA-256 of the canonical form
    pub fn cache_key(&self) -> String {
        hex::encode(Sha256::digest(self.canonical().as_bytes()))
    }
}
