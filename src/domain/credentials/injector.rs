//! Private-client `Authorization` replacement for the auth upstream

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use regex::Regex;
use tracing::{debug, warn};

use super::SecretProvider;
use crate::domain::DomainError;

/// What the injector did to an outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Path is not sensitive, or is the excluded login path
    NotApplicable,
    /// Sensitive path but the request carries no `Authorization` to replace
    NoAuthorization,
    /// `Authorization` replaced with client Basic credentials
    Injected,
    /// Secrets unavailable; forwarded untouched
    CredentialsMissing,
}

/// Replaces an existing `Authorization` header with private-client Basic
/// credentials on sensitive auth paths.
///
/// The header is only ever replaced, never added, and the login path is
/// excluded because it carries end-user credentials. Missing secrets fail
/// open: the request is forwarded unchanged and a warning is logged.
pub struct CredentialInjector {
    sensitive: Regex,
    excluded: Regex,
    provider: Arc<dyn SecretProvider>,
}

impl std::fmt::Debug for CredentialInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInjector")
            .field("sensitive", &self.sensitive.as_str())
            .field("excluded", &self.excluded.as_str())
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl CredentialInjector {
    pub fn new(
        sensitive_pattern: &str,
        excluded_pattern: &str,
        provider: Arc<dyn SecretProvider>,
    ) -> Result<Self, DomainError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                DomainError::configuration(format!("Invalid credential path pattern '{}': {}", pattern, e))
            })
        };

        Ok(Self {
            sensitive: compile(sensitive_pattern)?,
            excluded: compile(excluded_pattern)?,
            provider,
        })
    }

    /// True when `path` is sensitive and not excluded
    pub fn applies_to(&self, path: &str) -> bool {
        self.sensitive.is_match(path) && !self.excluded.is_match(path)
    }

    /// Rewrites `headers` for an outbound request to `path` if applicable
    pub async fn maybe_inject(&self, path: &str, headers: &mut HeaderMap) -> InjectionOutcome {
        if !self.applies_to(path) {
            return InjectionOutcome::NotApplicable;
        }

        if !headers.contains_key(AUTHORIZATION) {
            return InjectionOutcome::NoAuthorization;
        }

        let credentials = match self.provider.client_credentials().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(
                    path = %path,
                    provider = self.provider.provider_name(),
                    error = %e,
                    "Client credentials unavailable, forwarding without injection"
                );
                return InjectionOutcome::CredentialsMissing;
            }
        };

        match HeaderValue::from_str(&credentials.basic_authorization()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                debug!(path = %path, client_id = credentials.client_id(), "Injected client credentials");
                InjectionOutcome::Injected
            }
            Err(_) => {
                warn!(path = %path, "Client credentials are not a valid header value");
                InjectionOutcome::CredentialsMissing
            }
        }
    }
}
