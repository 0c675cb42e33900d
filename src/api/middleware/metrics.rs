//! HTTP metrics middleware

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::infrastructure::observability::record_http_request;

const UNMATCHED: &str = "unmatched";

/// Metric label for traffic answered outside the axum route table.
///
/// Set as a response extension by the edge pipeline so proxied and rendered
/// paths are counted per route instead of per raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficLabel(pub String);

/// Records request count and latency
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string());

    let response = next.run(request).await;

    let path = path_label(matched, &response);
    record_http_request(method.as_str(), &path, response.status().as_u16(), start.elapsed());

    response
}

fn path_label(matched: Option<String>, response: &Response) -> String {
    matched
        .or_else(|| response.extensions().get::<TrafficLabel>().map(|l| l.0.clone()))
        .unwrap_or_else(|| UNMATCHED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: Option<&str>) -> Response {
        let mut response = Response::new(Body::empty());
        if let Some(label) = label {
            response.extensions_mut().insert(TrafficLabel(label.to_string()));
        }
        response
    }

    #[test]
    fn test_matched_path_wins() {
        let label = path_label(Some("/health".to_string()), &labelled(Some("render")));
        assert_eq!(label, "/health");
    }

    #[test]
    fn test_fallback_traffic_uses_traffic_label() {
        assert_eq!(path_label(None, &labelled(Some("proxy/ocapi"))), "proxy/ocapi");
    }

    #[test]
    fn test_unlabelled_fallback_is_bucketed() {
        assert_eq!(path_label(None, &labelled(None)), UNMATCHED);
    }
}
