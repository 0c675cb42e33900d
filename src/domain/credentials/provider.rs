use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::ClientCredentials;
use crate::domain::DomainError;

/// Source of private-client secrets (environment, secret store, ...)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Reads the client credentials. Fails with `CredentialsMissing` when unset.
    async fn client_credentials(&self) -> Result<ClientCredentials, DomainError>;

    /// Get provider name for logging/debugging
    fn provider_name(&self) -> &'static str;
}
