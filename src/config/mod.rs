//! Application configuration loaded once at startup

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, CredentialSettings, DeviceSettings, LogFormat, LoggingConfig,
    MetricsConfig, PipelineSettings, ProxySettings, S3Settings, ServerConfig,
};
