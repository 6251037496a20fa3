//! Configuration management for SPF services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Object storage configuration (S3/MinIO)
    pub storage: StorageConfig,

    /// Queue configuration (SQS)
    pub queue: QueueConfig,

    /// Package intake configuration
    #[serde(default)]
    pub ingress: IngressConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds

    /// Maximum upload body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Object storage connection surface.
///
/// Every value is required; [`StorageConfig::validate`] names the first
/// missing one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Endpoint host, with optional port (e.g. `minio:9000`)
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    /// Use TLS when talking to the endpoint
    #[serde(default)]
    pub secure: bool,

    /// Operation timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: u64,

    /// Target bucket
    #[serde(default)]
    pub collection: String,

    /// Working subdirectory every key is rooted at
    #[serde(default)]
    pub spf_dir: String,

    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// SQS task queue URL
    pub task_queue_url: Option<String>,

    /// Dead letter queue URL
    pub dlq_url: Option<String>,

    /// Maximum messages to receive per poll
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: u32,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Visibility timeout in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,

    /// Deliveries before a message is moved to the dead letter queue
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngressConfig {
    /// Where the gateway stores uploaded files until the worker picks them up
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// Accepted package file extension
    #[serde(default = "default_allowed_extension")]
    pub allowed_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_body_limit() -> usize { 200 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_region() -> String { "us-east-1".to_string() }
fn default_queue_batch_size() -> u32 { 10 }
fn default_queue_poll_timeout() -> u64 { 20 }
fn default_visibility_timeout() -> u64 { 300 }
fn default_max_receive_count() -> u32 { 3 }
fn default_temp_dir() -> String { std::env::temp_dir().join("spf-uploads").to_string_lossy().into_owned() }
fn default_allowed_extension() -> String { "zip".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "spf".to_string() }

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            allowed_extension: default_allowed_extension(),
        }
    }
}

impl StorageConfig {
    /// Check that the full connection surface is populated.
    pub fn validate(&self) -> Result<(), AppError> {
        let missing = [
            ("storage.host", self.host.trim().is_empty()),
            ("storage.access_key", self.access_key.is_empty()),
            ("storage.secret_key", self.secret_key.is_empty()),
            ("storage.timeout_ms", self.timeout_ms == 0),
            ("storage.collection", self.collection.trim().is_empty()),
            ("storage.spf_dir", self.spf_dir.trim().is_empty()),
        ]
        .into_iter()
        .find(|(_, is_missing)| *is_missing);

        match missing {
            Some((name, _)) => Err(AppError::Configuration {
                message: format!("Missing value for {name}"),
            }),
            None => Ok(()),
        }
    }

    /// Endpoint URL including scheme
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.host)
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__STORAGE__HOST=minio:9000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                body_limit_bytes: default_body_limit(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/spf".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            storage: StorageConfig {
                region: default_region(),
                ..StorageConfig::default()
            },
            queue: QueueConfig {
                task_queue_url: None,
                dlq_url: None,
                batch_size: default_queue_batch_size(),
                poll_timeout_secs: default_queue_poll_timeout(),
                visibility_timeout_secs: default_visibility_timeout(),
                max_receive_count: default_max_receive_count(),
            },
            ingress: IngressConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}
