//! Cacheability policy for upstream and rendered responses

use std::fmt::Debug;
use std::time::Duration;

use http::header::{CACHE_CONTROL, SET_COOKIE};
use http::{HeaderMap, Method, StatusCode};

/// The parts of an exchange a policy decides on
#[derive(Debug, Clone, Copy)]
pub struct CacheCandidate<'a> {
    pub method: &'a Method,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub body_len: usize,
}

/// Decides whether a response may be stored, and for how long
pub trait CachePolicy: Send + Sync + Debug {
    /// Returns the TTL to store the response with, or `None` if it must not be cached
    fn ttl_for(&self, candidate: &CacheCandidate<'_>) -> Option<Duration>;
}

/// Default policy: 200 responses to GET/HEAD without cookies or private directives
#[derive(Debug, Clone)]
pub struct DefaultCachePolicy {
    pub default_ttl: Duration,
    pub max_entry_bytes: usize,
}

impl Default for DefaultCachePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            max_entry_bytes: 1024 * 1024,
        }
    }
}

impl DefaultCachePolicy {
    pub fn new(default_ttl: Duration, max_entry_bytes: usize) -> Self {
        Self {
            default_ttl,
            max_entry_bytes,
        }
    }
}

impl CachePolicy for DefaultCachePolicy {
    fn ttl_for(&self, candidate: &CacheCandidate<'_>) -> Option<Duration> {
        if candidate.method != Method::GET && candidate.method != Method::HEAD {
            return None;
        }

        if candidate.status != StatusCode::OK
            || candidate.body_len > self.max_entry_bytes
            || candidate.headers.contains_key(SET_COOKIE)
        {
            return None;
        }

        let directives = CacheControl::parse(candidate.headers);

        if directives.no_store || directives.no_cache || directives.private {
            return None;
        }

        let ttl = directives
            .s_maxage
            .or(directives.max_age)
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);

        if ttl.is_zero() { None } else { Some(ttl) }
    }
}

/// Parsed subset of `Cache-Control` directives
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheControl {
    pub no_store: bool,
    pub no_cache: bool,
    pub private: bool,
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
}

impl CacheControl {
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut parsed = Self::default();

        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else {
                continue;
            };

            for directive in value.split(',') {
                let directive = directive.trim().to_lowercase();
                let (name, arg) = match directive.split_once('=') {
                    Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
                    None => (directive.as_str(), None),
                };

                match name {
                    "no-store" => parsed.no_store = true,
                    "no-cache" => parsed.no_cache = true,
                    "private" => parsed.private = true,
                    "max-age" => parsed.max_age = arg.and_then(|a| a.parse().ok()),
                    "s-maxage" => parsed.s_maxage = arg.and_then(|a| a.parse().ok()),
                    _ => {}
                }
            }
        }

        parsed
    }
}
