//! Edge pipeline middleware

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::metrics::TrafficLabel;
use crate::api::state::AppState;
use crate::api::types::ApiError;

/// Runs every request through the request pipeline. Requests that match no
/// proxy route continue to the inner service (the renderer).
pub async fn pipeline_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let label = TrafficLabel(state.pipeline.traffic_label(request.uri().path()));

    let mut response = match state.pipeline.handle(request, |req| next.run(req)).await {
        Ok(response) => response,
        Err(e) => ApiError::from(e).into_response(),
    };

    response.extensions_mut().insert(label);
    response
}
