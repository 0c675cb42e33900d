//! Upstream forwarding for configured proxy routes

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HOST};
use http::{HeaderMap, Method, StatusCode};
use reqwest::{Client, redirect};
use tracing::{debug, info, warn};

use crate::config::ProxySettings;
use crate::domain::proxy::{
    CookieRewritePolicy, ProxyRoute, RewriteContext, RouteTable, outbound_headers, rewrite_body,
    rewrite_response_headers,
};
use crate::domain::{CredentialInjector, DomainError};
use crate::infrastructure::observability::record_upstream_request;

/// Inbound request as seen by the proxy layer
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Externally visible origin, e.g. `https://www.shop.com`
    pub public_origin: String,
}

/// Upstream response after public-origin rewriting
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Maps inbound paths to upstream origins and forwards requests.
///
/// Redirects are never followed; a 3xx is relayed with its `Location`
/// rewritten to the public origin.
#[derive(Debug, Clone)]
pub struct ProxyRouter {
    table: RouteTable,
    client: Client,
    injector: Option<Arc<CredentialInjector>>,
    cookies: CookieRewritePolicy,
    rewrite_body: bool,
}

impl ProxyRouter {
    pub fn new(settings: &ProxySettings) -> Result<Self, DomainError> {
        let table = RouteTable::new(settings.routes.clone())?;

        for (first, second) in table.overlaps() {
            warn!(
                first = %first,
                second = %second,
                "Overlapping proxy prefixes, the first configured route wins"
            );
        }

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(settings.upstream_timeout_secs))
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        info!(routes = settings.routes.len(), "Proxy routes loaded");

        Ok(Self {
            table,
            client,
            injector: None,
            cookies: settings.cookies.clone(),
            rewrite_body: settings.rewrite_body,
        })
    }

    pub fn with_injector(mut self, injector: Arc<CredentialInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// First configured route whose prefix is contained in `path`
    pub fn route(&self, path: &str) -> Option<&ProxyRoute> {
        self.table.route(path)
    }

    /// Forwards `request` to the route's upstream
    pub async fn forward(
        &self,
        route: &ProxyRoute,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, DomainError> {
        let path = match self.table.strip_prefix(route, &request.path) {
            Ok(path) => path,
            Err(e) => {
                warn!(route = route.name(), path = %request.path, error = %e, "Forwarding path unmodified");
                request.path.clone()
            }
        };

        let url = match &request.query {
            Some(query) if !query.is_empty() => format!("{}{}?{}", route.target.origin(), path, query),
            _ => format!("{}{}", route.target.origin(), path),
        };

        let forwarded_host = request.headers.get(HOST).and_then(|v| v.to_str().ok());
        let forwarded_proto = request
            .public_origin
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or("http");

        let mut headers = outbound_headers(&request.headers, route, forwarded_host, forwarded_proto);

        if let Some(injector) = &self.injector {
            let outcome = injector.maybe_inject(&path, &mut headers).await;
            debug!(route = route.name(), path = %path, outcome = ?outcome, "Credential injection");
        }

        debug!(route = route.name(), method = %request.method, path = %path, "Forwarding to upstream");

        let mut outbound = self.client.request(request.method.clone(), &url).headers(headers);
        if !request.body.is_empty() {
            outbound = outbound.body(request.body);
        }

        let start = Instant::now();
        let response = match outbound.send().await {
            Ok(response) => response,
            Err(e) => {
                record_upstream_request(route.name(), None, start.elapsed());
                return Err(Self::map_error(route, e));
            }
        };

        let status = response.status();
        let mut headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| Self::map_error(route, e))?;

        record_upstream_request(route.name(), Some(status.as_u16()), start.elapsed());

        let ctx = RewriteContext {
            route,
            public_origin: &request.public_origin,
            cookies: &self.cookies,
            rewrite_body: self.rewrite_body,
        };

        rewrite_response_headers(&mut headers, &ctx);
        let body = rewrite_body(&headers, &body, &ctx).unwrap_or(body);
        headers.remove(CONTENT_LENGTH);

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    fn map_error(route: &ProxyRoute, error: reqwest::Error) -> DomainError {
        if error.is_timeout() {
            warn!(route = route.name(), "Upstream timed out");
            DomainError::upstream_timeout(route.name())
        } else {
            warn!(route = route.name(), error = %error, "Upstream request failed");
            DomainError::upstream(route.name(), error.to_string())
        }
    }
}
