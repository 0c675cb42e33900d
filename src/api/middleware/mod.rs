//! API middleware components

pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use logging::logging_middleware;
pub use metrics::{TrafficLabel, metrics_middleware};
pub use pipeline::pipeline_middleware;
