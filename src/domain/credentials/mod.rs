//! Credentials domain - private-client secret injection

mod credential;
mod injector;
mod provider;

pub use credential::ClientCredentials;
pub use injector::{CredentialInjector, InjectionOutcome};
pub use provider::SecretProvider;

#[cfg(test)]
pub use provider::MockSecretProvider;
