//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MetricsConfig;

static HEX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{16,}").expect("valid regex"));
static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid regex"));

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("storefront_edge_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.path.clone(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router<S>(metrics: PrometheusMetrics) -> Router<S> {
    let path = metrics.path.clone();

    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Outcome label for a cache read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookupResult {
    Hit,
    Miss,
    Error,
}

impl CacheLookupResult {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

/// Record a cache read
pub fn record_cache_lookup(backend: &'static str, result: CacheLookupResult) {
    counter!(
        "edge_cache_lookups_total",
        "backend" => backend,
        "result" => result.as_str()
    )
    .increment(1);
}

/// Record a cache write or delete
pub fn record_cache_write(backend: &'static str, success: bool) {
    counter!(
        "edge_cache_writes_total",
        "backend" => backend,
        "result" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record a forwarded upstream request; `status` is `None` on connection failure
pub fn record_upstream_request(route: &str, status: Option<u16>, duration: Duration) {
    let labels = [
        ("route", route.to_string()),
        (
            "status",
            status.map(|s| s.to_string()).unwrap_or_else(|| "error".to_string()),
        ),
    ];

    counter!("edge_upstream_requests_total", &labels).increment(1);
    histogram!("edge_upstream_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = HEX_ID.replace_all(path, "{id}");
    let path = NUMERIC_ID.replace_all(&path, "/{id}$1");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_hex_id() {
        let path = "/mobify/proxy/api/items/5f2b9c1e0a4d7e6f";
        assert_eq!(sanitize_path(path), "/mobify/proxy/api/items/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(sanitize_path("/product/12345"), "/product/{id}");
        assert_eq!(sanitize_path("/product/12345/reviews"), "/product/{id}/reviews");
    }

    #[test]
    fn test_sanitize_path_truncates() {
        let long = format!("/{}", "a".repeat(80));
        assert_eq!(sanitize_path(&long).len(), 50);
    }

    #[test]
    fn test_cache_lookup_result_labels() {
        assert_eq!(CacheLookupResult::Hit.as_str(), "hit");
        assert_eq!(CacheLookupResult::Miss.as_str(), "miss");
        assert_eq!(CacheLookupResult::Error.as_str(), "error");
    }
}
