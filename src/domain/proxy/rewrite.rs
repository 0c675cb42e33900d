//! Request and response rewriting for proxied traffic

use bytes::Bytes;
use http::header::{
    ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
    LOCATION, SET_COOKIE,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ProxyRoute;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// How `Set-Cookie` headers from an upstream are adjusted for the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieRewritePolicy {
    pub strip_http_only: bool,
    pub rewrite_domain: bool,
    pub rewrite_path: bool,
}

impl Default for CookieRewritePolicy {
    fn default() -> Self {
        Self {
            strip_http_only: false,
            rewrite_domain: true,
            rewrite_path: true,
        }
    }
}

/// Public-facing side of a proxied exchange
#[derive(Debug, Clone)]
pub struct RewriteContext<'a> {
    pub route: &'a ProxyRoute,
    /// e.g. `https://www.example.com`
    pub public_origin: &'a str,
    pub cookies: &'a CookieRewritePolicy,
    pub rewrite_body: bool,
}

impl RewriteContext<'_> {
    /// Host part of the public origin, without port
    pub fn public_host(&self) -> &str {
        let authority = self
            .public_origin
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(self.public_origin);

        authority.split(':').next().unwrap_or(authority)
    }

    /// Public URL base that replaces the upstream origin
    pub fn public_base(&self) -> String {
        format!(
            "{}{}",
            self.public_origin.trim_end_matches('/'),
            self.route.path_prefix
        )
    }
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Builds the outbound header set for an upstream request.
///
/// `Host` is left out so the client sets it from the target URL.
/// `Accept-Encoding` is dropped so upstream bodies arrive uncompressed and
/// can be rewritten and cached as a single variant.
pub fn outbound_headers(
    inbound: &HeaderMap,
    route: &ProxyRoute,
    forwarded_host: Option<&str>,
    forwarded_proto: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + route.headers.len() + 2);

    for (name, value) in inbound {
        if name == HOST
            || name == CONTENT_LENGTH
            || name == ACCEPT_ENCODING
            || is_hop_by_hop(name)
        {
            continue;
        }

        if route.caching && (name == COOKIE || name == AUTHORIZATION) {
            continue;
        }

        headers.append(name.clone(), value.clone());
    }

    if let Some(host) = forwarded_host.and_then(|h| HeaderValue::from_str(h).ok()) {
        headers.insert("x-forwarded-host", host);
    }

    if let Ok(proto) = HeaderValue::from_str(forwarded_proto) {
        headers.insert("x-forwarded-proto", proto);
    }

    for (name, value) in &route.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(route = %route.path_prefix, header = %name, "Skipping invalid header override"),
        }
    }

    headers
}

/// Rewrites upstream response headers in place for the public origin
pub fn rewrite_response_headers(headers: &mut HeaderMap, ctx: &RewriteContext<'_>) {
    let hop: Vec<HeaderName> = headers.keys().filter(|n| is_hop_by_hop(n)).cloned().collect();
    for name in hop {
        headers.remove(name);
    }

    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|l| rewrite_location(l, ctx));

    if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
        headers.insert(LOCATION, value);
    }

    if ctx.route.caching {
        headers.remove(SET_COOKIE);
        return;
    }

    let cookies: Vec<String> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| rewrite_set_cookie(v, ctx))
        .collect();

    if cookies.is_empty() {
        return;
    }

    headers.remove(SET_COOKIE);
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(SET_COOKIE, value);
        }
    }
}

/// Replaces the upstream origin in an absolute `Location` with the public base
pub fn rewrite_location(location: &str, ctx: &RewriteContext<'_>) -> Option<String> {
    let origin = ctx.route.target.origin();

    location
        .strip_prefix(origin.as_str())
        .filter(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
        .map(|rest| format!("{}{}", ctx.public_base(), rest))
}

/// Applies the cookie policy to a single `Set-Cookie` value
pub fn rewrite_set_cookie(value: &str, ctx: &RewriteContext<'_>) -> String {
    let mut parts = value.split(';').map(str::trim).filter(|p| !p.is_empty());
    let Some(pair) = parts.next() else {
        return value.to_string();
    };

    let mut rewritten = vec![pair.to_string()];

    for attribute in parts {
        let name = attribute
            .split_once('=')
            .map(|(n, _)| n)
            .unwrap_or(attribute)
            .trim()
            .to_lowercase();

        match name.as_str() {
            "httponly" if ctx.cookies.strip_http_only => continue,
            "domain" if ctx.cookies.rewrite_domain => {
                rewritten.push(format!("Domain={}", ctx.public_host()));
            }
            "path" if ctx.cookies.rewrite_path => {
                let path = attribute.split_once('=').map(|(_, p)| p.trim()).unwrap_or("/");
                let path = if path == "/" { "" } else { path };
                rewritten.push(format!("Path={}{}", ctx.route.path_prefix, path));
            }
            _ => rewritten.push(attribute.to_string()),
        }
    }

    rewritten.join("; ")
}

/// Replaces absolute links to the upstream origin in textual bodies.
///
/// Returns `None` when the body is left untouched (binary, compressed,
/// or nothing to replace).
pub fn rewrite_body(headers: &HeaderMap, body: &Bytes, ctx: &RewriteContext<'_>) -> Option<Bytes> {
    if !ctx.rewrite_body || headers.contains_key(CONTENT_ENCODING) {
        return None;
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    let textual = content_type.starts_with("text/")
        || content_type.contains("json")
        || content_type.contains("javascript")
        || content_type.contains("xml");

    if !textual {
        return None;
    }

    let text = std::str::from_utf8(body).ok()?;
    let origin = ctx.route.target.origin();

    if !text.contains(origin.as_str()) {
        return None;
    }

    Some(Bytes::from(text.replace(origin.as_str(), &ctx.public_base())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proxy::ProxyTarget;

    fn route() -> ProxyRoute {
        ProxyRoute::new("/mobify/proxy/ocapi", ProxyTarget::https("example-upstream.com"))
            .with_header("x-mobify", "true")
    }

    fn ctx<'a>(route: &'a ProxyRoute, cookies: &'a CookieRewritePolicy) -> RewriteContext<'a> {
        RewriteContext {
            route,
            public_origin: "https://www.shop.com:8443",
            cookies,
            rewrite_body: true,
        }
    }

    #[test]
    fn test_strip_http_only_when_policy_requires() {
        let route = route();
        let policy = CookieRewritePolicy {
            strip_http_only: true,
            ..Default::default()
        };

        let cookie = rewrite_set_cookie("session=abc; HttpOnly", &ctx(&route, &policy));
        assert_eq!(cookie, "session=abc");
    }

    #[test]
    fn test_http_only_kept_by_default() {
        let route = route();
        let policy = CookieRewritePolicy::default();

        let cookie = rewrite_set_cookie("session=abc; HttpOnly", &ctx(&route, &policy));
        assert_eq!(cookie, "session=abc; HttpOnly");
    }

    #[test]
    fn test_cookie_domain_and_path_rewritten() {
        let route = route();
        let policy = CookieRewritePolicy::default();

        let cookie = rewrite_set_cookie(
            "dwsid=xyz; Domain=.example-upstream.com; Path=/s/Sites-Site; Secure",
            &ctx(&route, &policy),
        );
        assert_eq!(
            cookie,
            "dwsid=xyz; Domain=www.shop.com; Path=/mobify/proxy/ocapi/s/Sites-Site; Secure"
        );

        let root = rewrite_set_cookie("a=b; path=/", &ctx(&route, &policy));
        assert_eq!(root, "a=b; Path=/mobify/proxy/ocapi");
    }

    #[test]
    fn test_location_rewritten_to_public_origin() {
        let route = route();
        let policy = CookieRewritePolicy::default();
        let ctx = ctx(&route, &policy);

        assert_eq!(
            rewrite_location("https://example-upstream.com/s/cart?x=1", &ctx).as_deref(),
            Some("https://www.shop.com:8443/mobify/proxy/ocapi/s/cart?x=1")
        );
        assert_eq!(rewrite_location("https://other.com/s/cart", &ctx), None);
        assert_eq!(rewrite_location("https://example-upstream.com.evil/x", &ctx), None);
    }

    #[test]
    fn test_response_headers_rewritten() {
        let route = route();
        let policy = CookieRewritePolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("https://example-upstream.com/login"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; Domain=example-upstream.com"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));

        rewrite_response_headers(&mut headers, &ctx(&route, &policy));

        assert_eq!(
            headers.get(LOCATION).unwrap(),
            "https://www.shop.com:8443/mobify/proxy/ocapi/login"
        );
        let cookies: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0], "a=1; Domain=www.shop.com");
        assert!(!headers.contains_key("transfer-encoding"));
    }

    #[test]
    fn test_caching_route_drops_set_cookie() {
        let route = route().caching();
        let policy = CookieRewritePolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("a=1"));

        rewrite_response_headers(&mut headers, &ctx(&route, &policy));
        assert!(!headers.contains_key(SET_COOKIE));
    }

    #[test]
    fn test_outbound_headers() {
        let route = route();
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("www.shop.com"));
        inbound.insert("connection", HeaderValue::from_static("keep-alive"));
        inbound.insert(COOKIE, HeaderValue::from_static("a=1"));
        inbound.insert("accept", HeaderValue::from_static("application/json"));
        inbound.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));

        let headers = outbound_headers(&inbound, &route, Some("www.shop.com"), "https");

        assert!(!headers.contains_key(HOST));
        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key(ACCEPT_ENCODING));
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(headers.get(COOKIE).unwrap(), "a=1");
        assert_eq!(headers.get("x-mobify").unwrap(), "true");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "www.shop.com");
        assert_eq!(headers.get("x-forwarded-proto").unwrap(), "https");
    }

    #[test]
    fn test_caching_route_strips_credentials() {
        let route = route().caching();
        let mut inbound = HeaderMap::new();
        inbound.insert(COOKIE, HeaderValue::from_static("a=1"));
        inbound.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let headers = outbound_headers(&inbound, &route, None, "https");

        assert!(!headers.contains_key(COOKIE));
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_body_rewrite_for_text_content() {
        let route = route();
        let policy = CookieRewritePolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = Bytes::from(r#"{"next":"https://example-upstream.com/s/page/2"}"#);

        let rewritten = rewrite_body(&headers, &body, &ctx(&route, &policy)).unwrap();
        assert_eq!(
            rewritten,
            Bytes::from(r#"{"next":"https://www.shop.com:8443/mobify/proxy/ocapi/s/page/2"}"#)
        );
    }

    #[test]
    fn test_body_untouched_for_binary_or_compressed() {
        let route = route();
        let policy = CookieRewritePolicy::default();
        let body = Bytes::from("https://example-upstream.com/");

        let mut image = HeaderMap::new();
        image.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        assert!(rewrite_body(&image, &body, &ctx(&route, &policy)).is_none());

        let mut gzip = HeaderMap::new();
        gzip.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        gzip.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(rewrite_body(&gzip, &body, &ctx(&route, &policy)).is_none());
    }

    #[test]
    fn test_public_host_strips_scheme_and_port() {
        let route = route();
        let policy = CookieRewritePolicy::default();

        assert_eq!(ctx(&route, &policy).public_host(), "www.shop.com");
    }
}
