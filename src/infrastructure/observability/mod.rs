//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    CacheLookupResult, PrometheusMetrics, create_metrics_router, init_metrics,
    record_cache_lookup, record_cache_write, record_http_request, record_upstream_request,
};
