//! Proxy infrastructure - Upstream forwarding

mod router;

pub use router::{ProxyRequest, ProxyResponse, ProxyRouter};
