//! Infrastructure layer - Cache backends, upstream forwarding and the request pipeline

pub mod cache;
pub mod credentials;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod proxy;
