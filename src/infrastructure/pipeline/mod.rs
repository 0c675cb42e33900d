//! Request pipeline - classify, look up, forward or render, populate

mod replay;

pub use replay::{CACHE_STATUS_HEADER, StoredResponse};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response};
use chrono::Utc;
use http::header::{ACCEPT_ENCODING, HOST, VARY};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::domain::{
    CacheCandidate, CachePolicy, CredentialInjector, DefaultCachePolicy, DeviceClassifier,
    DeviceType, DomainError, ProxyRoute, RequestFingerprint,
};
use crate::infrastructure::cache::PersistentCache;
use crate::infrastructure::credentials::EnvSecretProvider;
use crate::infrastructure::proxy::{ProxyRequest, ProxyRouter};

const RENDER_NAMESPACE: &str = "render";

/// Request headers that never reach the origin on a caching proxy route
const PROXY_UNFORWARDED: &[&str] = &["accept-encoding", "authorization", "cookie"];

/// Request headers removed before a cached render
const RENDER_UNFORWARDED: &[&str] = &["accept-encoding"];

/// Composes device classification, the persistent cache and the proxy router.
///
/// Requests matching a proxy route are answered here. Everything else goes to
/// the downstream renderer, optionally cached when render caching is on.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    classifier: DeviceClassifier,
    cache: PersistentCache,
    router: ProxyRouter,
    policy: Arc<dyn CachePolicy>,
    namespace_prefix: String,
    public_origin: Option<String>,
    cache_rendered_pages: bool,
    ignore_query_parameters: Vec<String>,
    vary_headers: Vec<String>,
}

impl RequestPipeline {
    pub fn new(
        classifier: DeviceClassifier,
        cache: PersistentCache,
        router: ProxyRouter,
        policy: Arc<dyn CachePolicy>,
    ) -> Self {
        let defaults = crate::config::PipelineSettings::default();

        Self {
            classifier,
            cache,
            router,
            policy,
            namespace_prefix: crate::config::CacheSettings::default().namespace_prefix,
            public_origin: None,
            cache_rendered_pages: defaults.cache_rendered_pages,
            ignore_query_parameters: defaults.ignore_query_parameters,
            vary_headers: defaults.vary_headers,
        }
    }

    /// Builds the full pipeline from application config
    pub fn from_config(config: &AppConfig, cache: PersistentCache) -> Result<Self, DomainError> {
        let classifier = DeviceClassifier::new(&config.device.override_param);

        let mut router = ProxyRouter::new(&config.proxy)?;
        if config.credentials.enabled {
            let injector = CredentialInjector::new(
                &config.credentials.sensitive_path_pattern,
                &config.credentials.excluded_path_pattern,
                Arc::new(EnvSecretProvider::from_settings(&config.credentials)),
            )?;
            router = router.with_injector(Arc::new(injector));
        }

        let policy = DefaultCachePolicy::new(
            Duration::from_secs(config.cache.default_ttl_secs),
            config.cache.max_entry_bytes,
        );

        let mut pipeline = Self::new(classifier, cache, router, Arc::new(policy))
            .with_namespace_prefix(&config.cache.namespace_prefix)
            .with_render_caching(config.pipeline.cache_rendered_pages)
            .with_ignored_query_parameters(config.pipeline.ignore_query_parameters.clone())
            .with_vary_headers(config.pipeline.vary_headers.clone());

        if let Some(origin) = &config.proxy.public_origin {
            pipeline = pipeline.with_public_origin(origin);
        }

        Ok(pipeline)
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_public_origin(mut self, origin: impl Into<String>) -> Self {
        self.public_origin = Some(origin.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_render_caching(mut self, enabled: bool) -> Self {
        self.cache_rendered_pages = enabled;
        self
    }

    pub fn with_ignored_query_parameters(mut self, names: Vec<String>) -> Self {
        self.ignore_query_parameters = names;
        self
    }

    pub fn with_vary_headers(mut self, names: Vec<String>) -> Self {
        self.vary_headers = names.into_iter().map(|n| n.to_lowercase()).collect();
        self
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    pub fn router(&self) -> &ProxyRouter {
        &self.router
    }

    /// Bounded label for the traffic class of `path`: `proxy/<route>` or `render`
    pub fn traffic_label(&self, path: &str) -> String {
        match self.router.route(path) {
            Some(route) => format!("proxy/{}", route.name()),
            None => RENDER_NAMESPACE.to_string(),
        }
    }

    /// Handles one inbound request.
    ///
    /// `downstream` renders requests that match no proxy route. The device
    /// type is attached to the request extensions before it is called.
    pub async fn handle<F, Fut>(
        &self,
        mut request: Request<Body>,
        downstream: F,
    ) -> Result<Response<Body>, DomainError>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response<Body>>,
    {
        let device = self
            .classifier
            .classify(request.uri().query(), request.headers());
        request.extensions_mut().insert(device);

        let path = request.uri().path().to_string();

        if let Some(route) = self.router.route(&path).cloned() {
            return self.handle_proxy(&route, request, device).await;
        }

        if self.cache_rendered_pages && request.method() == Method::GET {
            return self.handle_render(request, device, downstream).await;
        }

        Ok(downstream(request).await)
    }

    async fn handle_proxy(
        &self,
        route: &ProxyRoute,
        request: Request<Body>,
        device: DeviceType,
    ) -> Result<Response<Body>, DomainError> {
        let method = request.method().clone();
        let cacheable = route.caching && (method == Method::GET || method == Method::HEAD);

        let slot = cacheable.then(|| {
            (
                self.fingerprint(&request, device).cache_key(),
                self.namespace(route.name()),
            )
        });

        if let Some((key, namespace)) = &slot {
            if let Some(hit) = StoredResponse::from_lookup(self.cache.get(key, namespace).await) {
                debug!(route = route.name(), key = %key, "Serving proxied response from cache");
                return Ok(into_response(hit, Some("HIT")));
            }
        }

        let public_origin = self.public_origin(request.headers());
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, usize::MAX)
            .await
            .map_err(|e| DomainError::validation(format!("Failed to read request body: {}", e)))?;

        let proxied = self
            .router
            .forward(
                route,
                ProxyRequest {
                    method: parts.method.clone(),
                    path: parts.uri.path().to_string(),
                    query: parts.uri.query().map(str::to_string),
                    headers: parts.headers,
                    body,
                    public_origin,
                },
            )
            .await?;

        let response = StoredResponse {
            status: proxied.status,
            headers: proxied.headers,
            body: proxied.body,
        };

        match slot {
            Some((key, namespace)) => {
                self.populate(&method, key, namespace, &response, PROXY_UNFORWARDED)
                    .await;
                Ok(into_response(response, Some("MISS")))
            }
            None => Ok(into_response(response, None)),
        }
    }

    async fn handle_render<F, Fut>(
        &self,
        mut request: Request<Body>,
        device: DeviceType,
        downstream: F,
    ) -> Result<Response<Body>, DomainError>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response<Body>>,
    {
        let key = self.fingerprint(&request, device).cache_key();
        let namespace = self.namespace(RENDER_NAMESPACE);

        if let Some(hit) = StoredResponse::from_lookup(self.cache.get(&key, &namespace).await) {
            debug!(key = %key, "Serving rendered page from cache");
            return Ok(into_response(hit, Some("HIT")));
        }

        // Cached pages are stored and replayed uncompressed
        request.headers_mut().remove(ACCEPT_ENCODING);

        let method = request.method().clone();
        let (parts, body) = downstream(request).await.into_parts();

        let body = to_bytes(body, usize::MAX).await.map_err(|e| {
            DomainError::internal(format!("Failed to buffer rendered response: {}", e))
        })?;

        let response = StoredResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        };

        self.populate(&method, key, namespace, &response, RENDER_UNFORWARDED)
            .await;
        Ok(into_response(response, Some("MISS")))
    }

    /// Stores a response if the policy allows. Failures are logged only.
    ///
    /// The write runs on its own task so it completes even if the client
    /// disconnects and this request future is dropped.
    async fn populate(
        &self,
        method: &Method,
        key: String,
        namespace: String,
        response: &StoredResponse,
        unforwarded: &[&str],
    ) {
        if let Some(header) = self.vary_outside_key(&response.headers, unforwarded) {
            debug!(key = %key, vary = %header, "Response varies on a header outside the cache key");
            return;
        }

        let candidate = CacheCandidate {
            method,
            status: response.status,
            headers: &response.headers,
            body_len: response.body.len(),
        };

        let Some(ttl) = self.policy.ttl_for(&candidate) else {
            debug!(key = %key, status = response.status.as_u16(), "Response not cacheable");
            return;
        };

        let expiration = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let cache = self.cache.clone();
        let metadata = response.metadata();
        let data = response.body.clone();

        let write = tokio::spawn(async move {
            if let Err(e) = cache.put(&key, &namespace, data, Some(metadata), expiration).await {
                warn!(key = %key, namespace = %namespace, error = %e, "Cache population failed");
            }
        });

        if let Err(e) = write.await {
            warn!(error = %e, "Cache population task failed");
        }
    }

    fn fingerprint(&self, request: &Request<Body>, device: DeviceType) -> RequestFingerprint {
        let mut ignored = self.ignore_query_parameters.clone();
        ignored.push(self.classifier.override_param().to_string());

        let mut fingerprint = RequestFingerprint::new(
            request.method().as_str(),
            request.uri().path(),
            device,
        )
        .with_query(request.uri().query(), &ignored);

        for name in &self.vary_headers {
            if let Some(value) = request.headers().get(name).and_then(|v| v.to_str().ok()) {
                fingerprint = fingerprint.with_vary(name, value);
            }
        }

        fingerprint
    }

    /// First `Vary` entry that is neither part of the cache key nor
    /// withheld from the origin. `*` always qualifies.
    fn vary_outside_key(&self, headers: &HeaderMap, unforwarded: &[&str]) -> Option<String> {
        headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .find(|name| {
                name == "*"
                    || !(self.vary_headers.contains(name) || unforwarded.contains(&name.as_str()))
            })
    }

    fn namespace(&self, name: &str) -> String {
        format!("{}/{}", self.namespace_prefix, name)
    }

    fn public_origin(&self, headers: &HeaderMap) -> String {
        if let Some(origin) = &self.public_origin {
            return origin.clone();
        }

        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");

        format!("{}://{}", proto, host)
    }
}

fn into_response(stored: StoredResponse, cache_status: Option<&'static str>) -> Response<Body> {
    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = stored.status;
    *response.headers_mut() = stored.headers;

    if let Some(status) = cache_status {
        response
            .headers_mut()
            .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    }

    response
}
