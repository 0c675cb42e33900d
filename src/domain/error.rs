use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Cache backend unavailable: {message}")]
    CacheBackendUnavailable { message: String },

    #[error("Cache write failed: {message}")]
    CacheWriteFailed { message: String },

    #[error("Upstream unreachable: {upstream} - {message}")]
    UpstreamUnreachable { upstream: String, message: String },

    #[error("Upstream timed out: {upstream}")]
    UpstreamTimeout { upstream: String },

    #[error("Misconfigured route '{prefix}': {message}")]
    MisconfiguredRoute { prefix: String, message: String },

    #[error("Credentials missing: {message}")]
    CredentialsMissing { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn cache_unavailable(message: impl Into<String>) -> Self {
        Self::CacheBackendUnavailable {
            message: message.into(),
        }
    }

    pub fn cache_write(message: impl Into<String>) -> Self {
        Self::CacheWriteFailed {
            message: message.into(),
        }
    }

    pub fn upstream(upstream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            upstream: upstream.into(),
            message: message.into(),
        }
    }

    pub fn upstream_timeout(upstream: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            upstream: upstream.into(),
        }
    }

    pub fn misconfigured_route(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MisconfiguredRoute {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    pub fn credentials_missing(message: impl Into<String>) -> Self {
        Self::CredentialsMissing {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for failures of an upstream origin (as opposed to this layer)
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnreachable { .. } | Self::UpstreamTimeout { .. }
        )
    }
}
