use axum::{
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{logging_middleware, metrics_middleware, pipeline_middleware};
use super::state::AppState;
use super::types::ApiError;
use crate::infrastructure::observability::create_metrics_router;

/// Create the full router.
///
/// Health and metrics endpoints are answered directly. Every other path goes
/// through the edge pipeline, which either proxies it or hands it to the
/// renderer fallback.
pub fn create_router(state: AppState) -> Router {
    let edge = Router::new()
        .fallback(render_fallback)
        .layer(from_fn_with_state(state.clone(), pipeline_middleware))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .with_state(state.clone());

    if let Some(metrics) = state.metrics.clone() {
        router = router.merge(create_metrics_router(metrics));
    }

    router
        .fallback_service(edge)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// No renderer is mounted in this process; unproxied paths are not found.
async fn render_fallback() -> impl IntoResponse {
    ApiError::not_found("No route matches this path")
}
