//! Credential infrastructure - Secret provider implementations

mod env_provider;

pub use env_provider::EnvSecretProvider;
