//! Proxy route configuration and path matching

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Upstream origin a route forwards to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyTarget {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
}

fn default_protocol() -> String {
    "https".to_string()
}

impl ProxyTarget {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
        }
    }

    pub fn https(host: impl Into<String>) -> Self {
        Self::new("https", host)
    }

    /// `protocol://host`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }
}

/// Path-prefix route to an upstream origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub path_prefix: String,
    pub target: ProxyTarget,
    /// Headers forced onto every outbound request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Caching proxy: strips cookies/credentials and makes responses cacheable
    #[serde(default)]
    pub caching: bool,
}

impl ProxyRoute {
    pub fn new(path_prefix: impl Into<String>, target: ProxyTarget) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            target,
            headers: BTreeMap::new(),
            caching: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn caching(mut self) -> Self {
        self.caching = true;
        self
    }

    /// Short label for logs and metrics, the last prefix segment
    pub fn name(&self) -> &str {
        self.path_prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path_prefix)
    }

    /// Prefix without trailing slashes, the form used for matching
    fn match_prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    fn validate(&self) -> Result<(), DomainError> {
        if !self.path_prefix.starts_with('/') || self.match_prefix().is_empty() {
            return Err(DomainError::configuration(format!(
                "Proxy path prefix must start with '/' and not be the root: '{}'",
                self.path_prefix
            )));
        }

        if !matches!(self.target.protocol.as_str(), "http" | "https") {
            return Err(DomainError::configuration(format!(
                "Unsupported protocol '{}' for proxy '{}'",
                self.target.protocol, self.path_prefix
            )));
        }

        if self.target.host.is_empty() || self.target.host.contains('/') {
            return Err(DomainError::configuration(format!(
                "Invalid target host '{}' for proxy '{}'",
                self.target.host, self.path_prefix
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    route: ProxyRoute,
    anchor: Regex,
}

/// True when `prefix` occurs in `path` and ends on a segment boundary
fn contains_segment_prefix(path: &str, prefix: &str) -> bool {
    path.match_indices(prefix).any(|(start, _)| {
        matches!(path[start + prefix.len()..].chars().next(), None | Some('/') | Some('?'))
    })
}

/// Ordered, read-only set of proxy routes. First configured match wins.
///
/// A prefix matches wherever it occurs in the path, but only when followed
/// by `/`, `?` or the end of the path, so `/api` never matches `/apiv2`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<ProxyRoute>) -> Result<Self, DomainError> {
        let routes = routes
            .into_iter()
            .map(|route| {
                route.validate()?;
                let anchor = Regex::new(&format!("^{}(/|$)", regex::escape(route.match_prefix())))
                    .map_err(|e| DomainError::configuration(format!("Invalid prefix: {}", e)))?;
                Ok(CompiledRoute { route, anchor })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Self { routes })
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &ProxyRoute> {
        self.routes.iter().map(|c| &c.route)
    }

    /// Finds the first route whose prefix is contained in the path
    pub fn route(&self, path: &str) -> Option<&ProxyRoute> {
        self.routes
            .iter()
            .find(|c| contains_segment_prefix(path, c.route.match_prefix()))
            .map(|c| &c.route)
    }

    /// Strips the route prefix from the start of `path`.
    ///
    /// Errors with `MisconfiguredRoute` when the prefix does not anchor the path;
    /// callers fail open and forward the path unmodified.
    pub fn strip_prefix(&self, route: &ProxyRoute, path: &str) -> Result<String, DomainError> {
        let compiled = self
            .routes
            .iter()
            .find(|c| c.route.path_prefix == route.path_prefix)
            .ok_or_else(|| DomainError::misconfigured_route(&route.path_prefix, "unknown route"))?;

        if !compiled.anchor.is_match(path) {
            return Err(DomainError::misconfigured_route(
                &route.path_prefix,
                format!("prefix does not anchor path '{}'", path),
            ));
        }

        let rest = compiled.anchor.replace(path, "$1");

        Ok(if rest.is_empty() {
            "/".to_string()
        } else if rest.starts_with('/') {
            rest.into_owned()
        } else {
            format!("/{}", rest)
        })
    }

    /// Pairs of prefixes where a path could match both, in configuration order
    pub fn overlaps(&self) -> Vec<(String, String)> {
        let mut overlaps = Vec::new();

        for (i, a) in self.routes.iter().enumerate() {
            for b in self.routes.iter().skip(i + 1) {
                let (pa, pb) = (a.route.match_prefix(), b.route.match_prefix());

                if contains_segment_prefix(pa, pb) || contains_segment_prefix(pb, pa) {
                    overlaps.push((a.route.path_prefix.clone(), b.route.path_prefix.clone()));
                }
            }
        }

        overlaps
    }
}
