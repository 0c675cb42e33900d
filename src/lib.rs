//! Storefront edge runtime
//!
//! Response cache and reverse-proxy layer that sits in front of a
//! server-rendered storefront:
//! - Device classification (override parameter, CDN headers, user agent)
//! - Persistent cache with local and S3 backends
//! - Path-prefix proxy routes with cookie, redirect and body rewriting
//! - Private-client credential injection for the auth upstream

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use api::state::AppState;
use infrastructure::cache::CacheFactory;
use infrastructure::observability::PrometheusMetrics;
use infrastructure::pipeline::RequestPipeline;
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default(), None).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(
    config: &AppConfig,
    metrics: Option<PrometheusMetrics>,
) -> anyhow::Result<AppState> {
    let cache = CacheFactory::new().create(&config.cache).await?;
    let pipeline = RequestPipeline::from_config(config, cache)?;

    info!(
        cache = pipeline.cache().backend_name(),
        routes = config.proxy.routes.len(),
        credential_injection = config.credentials.enabled,
        render_caching = config.pipeline.cache_rendered_pages,
        "Edge pipeline ready"
    );

    Ok(AppState::new(pipeline).with_metrics(metrics))
}
