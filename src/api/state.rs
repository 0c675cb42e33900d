//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::cache::PersistentCache;
use crate::infrastructure::observability::PrometheusMetrics;
use crate::infrastructure::pipeline::RequestPipeline;

/// Application state shared by handlers and middleware
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RequestPipeline>,
    pub metrics: Option<PrometheusMetrics>,
}

impl AppState {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> &PersistentCache {
        self.pipeline.cache()
    }
}
