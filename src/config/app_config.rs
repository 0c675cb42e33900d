use serde::Deserialize;

use crate::domain::device::DEFAULT_OVERRIDE_PARAM;
use crate::domain::proxy::{CookieRewritePolicy, ProxyRoute};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub cache: CacheSettings,
    pub proxy: ProxySettings,
    pub device: DeviceSettings,
    pub credentials: CredentialSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

/// Persistent cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `local` or `s3`
    pub backend: String,
    pub namespace_prefix: String,
    pub default_ttl_secs: u64,
    pub max_entry_bytes: usize,
    /// Entry cap for the local backend
    pub max_capacity: u64,
    pub s3: S3Settings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct S3Settings {
    pub bucket: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub prefix: String,
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Externally visible origin; derived from the request when unset
    pub public_origin: Option<String>,
    pub routes: Vec<ProxyRoute>,
    pub cookies: CookieRewritePolicy,
    pub rewrite_body: bool,
    pub upstream_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub override_param: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub enabled: bool,
    pub sensitive_path_pattern: String,
    pub excluded_path_pattern: String,
    pub client_id_var: String,
    pub client_secret_var: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub cache_rendered_pages: bool,
    pub ignore_query_parameters: Vec<String>,
    pub vary_headers: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            namespace_prefix: "edge".to_string(),
            default_ttl_secs: 600,
            max_entry_bytes: 1024 * 1024,
            max_capacity: 10_000,
            s3: S3Settings::default(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            public_origin: None,
            routes: Vec::new(),
            cookies: CookieRewritePolicy::default(),
            rewrite_body: true,
            upstream_timeout_secs: 30,
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            override_param: DEFAULT_OVERRIDE_PARAM.to_string(),
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitive_path_pattern: "^/shopper/auth/v1/".to_string(),
            excluded_path_pattern: "/login/?$".to_string(),
            client_id_var: "SLAS_CLIENT_ID".to_string(),
            client_secret_var: "SLAS_CLIENT_SECRET".to_string(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_rendered_pages: false,
            ignore_query_parameters: vec![
                "utm_source".to_string(),
                "utm_medium".to_string(),
                "utm_campaign".to_string(),
                "gclid".to_string(),
                "fbclid".to_string(),
            ],
            vary_headers: vec!["accept-language".to_string()],
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.backend, "local");
        assert_eq!(config.device.override_param, "mobify_devicetype");
        assert!(!config.credentials.enabled);
        assert!(config.proxy.routes.is_empty());
        assert!(!config.pipeline.cache_rendered_pages);
    }

    #[test]
    fn test_deserialize_routes_from_toml() {
        let source = r#"
            [cache]
            backend = "s3"

            [cache.s3]
            bucket = "edge-cache"

            [[proxy.routes]]
            path_prefix = "/mobify/proxy/ocapi"
            target = { host = "example-upstream.com" }

            [[proxy.routes]]
            path_prefix = "/mobify/caching/api"
            target = { protocol = "http", host = "localhost:3000" }
            headers = { x-mobify = "true" }
            caching = true
        "#;

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.cache.backend, "s3");
        assert_eq!(config.cache.s3.bucket.as_deref(), Some("edge-cache"));
        assert_eq!(config.proxy.routes.len(), 2);
        assert_eq!(config.proxy.routes[0].target.protocol, "https");
        assert!(!config.proxy.routes[0].caching);
        assert!(config.proxy.routes[1].caching);
        assert_eq!(config.proxy.routes[1].headers.get("x-mobify").unwrap(), "true");
    }
}
