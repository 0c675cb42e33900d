use async_trait::async_trait;
use std::env;

use crate::config::CredentialSettings;
use crate::domain::{ClientCredentials, DomainError, SecretProvider};

/// Secret provider that reads the private-client id and secret from
/// environment variables on every call
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    client_id_var: String,
    client_secret_var: String,
}

impl EnvSecretProvider {
    pub fn new(client_id_var: impl Into<String>, client_secret_var: impl Into<String>) -> Self {
        Self {
            client_id_var: client_id_var.into(),
            client_secret_var: client_secret_var.into(),
        }
    }

    pub fn from_settings(settings: &CredentialSettings) -> Self {
        Self::new(&settings.client_id_var, &settings.client_secret_var)
    }

    fn read_var(name: &str) -> Result<String, DomainError> {
        match env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(DomainError::credentials_missing(format!(
                "Environment variable '{}' not set",
                name
            ))),
        }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::from_settings(&CredentialSettings::default())
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn client_credentials(&self) -> Result<ClientCredentials, DomainError> {
        let client_id = Self::read_var(&self.client_id_var)?;
        let client_secret = Self::read_var(&self.client_secret_var)?;

        Ok(ClientCredentials::new(client_id, client_secret))
    }

    fn provider_name(&self) -> &'static str {
        "env"
    }
}
