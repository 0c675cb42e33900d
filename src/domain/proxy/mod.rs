//! Proxy domain - route table and wire rewriting rules

mod rewrite;
mod route;

pub use rewrite::{
    CookieRewritePolicy, RewriteContext, is_hop_by_hop, outbound_headers, rewrite_body,
    rewrite_location, rewrite_response_headers, rewrite_set_cookie,
};
pub use route::{ProxyRoute, ProxyTarget, RouteTable};
