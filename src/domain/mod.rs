//! Domain layer - device classification, cache, proxy and credential rules

pub mod cache;
pub mod credentials;
pub mod device;
pub mod error;
pub mod proxy;

pub use cache::{
    CacheBackend, CacheCandidate, CacheEntry, CacheLookup, CacheMetadata, CachePolicy,
    DefaultCachePolicy, RequestFingerprint,
};
pub use credentials::{ClientCredentials, CredentialInjector, InjectionOutcome, SecretProvider};
pub use device::{DeviceClassifier, DeviceType};
pub use error::DomainError;
pub use proxy::{CookieRewritePolicy, ProxyRoute, ProxyTarget, RewriteContext, RouteTable};
