//! Configuration loading and types for retailstore.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every field has a default, so a missing file or an
//! empty document yields a usable configuration apart from the storage
//! connection string, which can also come from the
//! `AZURE_STORAGE_CONNECTION_STRING` environment variable.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `storage.connection_string`.
pub const CONNECTION_STRING_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probe).
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Storage account and resource names.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bounds of the queue delete-by-id scan.
    #[serde(default)]
    pub queue_delete: QueueDeleteConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum accepted request body in bytes (uploads).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
///
/// Controls Prometheus metrics collection and the health probe.
/// Both are enabled by default.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the `/health` probe.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

/// Storage account credentials and the four managed resources.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Azure Storage connection string.
    #[serde(default)]
    pub connection_string: String,

    /// Table holding customer profiles.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Container holding product images.
    #[serde(default = "default_blob_container")]
    pub blob_container: String,

    /// Queue holding order events.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// File share holding contracts.
    #[serde(default = "default_file_share")]
    pub file_share: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            table_name: default_table_name(),
            blob_container: default_blob_container(),
            queue_name: default_queue_name(),
            file_share: default_file_share(),
        }
    }
}

/// Bounds of the best-effort queue delete-by-id scan.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueDeleteConfig {
    /// Number of receive passes before giving up.
    #[serde(default = "default_delete_passes")]
    pub passes: u32,

    /// Messages requested per receive pass (service maximum is 32).
    #[serde(default = "default_delete_batch_size")]
    pub batch_size: u32,

    /// Visibility timeout applied to received messages, in seconds.
    #[serde(default = "default_delete_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

impl QueueDeleteConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

impl Default for QueueDeleteConfig {
    fn default() -> Self {
        Self {
            passes: default_delete_passes(),
            batch_size: default_delete_batch_size(),
            visibility_timeout_secs: default_delete_visibility_timeout(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_upload_size() -> usize {
    104_857_600 // 100 MiB
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_table_name() -> String {
    "CustomerProfiles".to_string()
}

fn default_blob_container() -> String {
    "product-images".to_string()
}

fn default_queue_name() -> String {
    "order-events".to_string()
}

fn default_file_share() -> String {
    "contracts".to_string()
}

fn default_delete_passes() -> u32 {
    2
}

fn default_delete_batch_size() -> u32 {
    32
}

fn default_delete_visibility_timeout() -> u64 {
    5
}

// -- Loader ------------------------------------------------------------------

/// Parse configuration from a YAML document.  An empty document yields
/// the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}

/// Load configuration from a YAML file at `path`, falling back to the
/// defaults when the file does not exist, then apply environment
/// overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        parse_config(&contents)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        Config::default()
    };
    apply_env_overrides(&mut config, std::env::var(CONNECTION_STRING_ENV).ok());
    Ok(config)
}

/// Replace the configured connection string with `env_value` when set
/// and non-blank.
pub fn apply_env_overrides(config: &mut Config, env_value: Option<String>) {
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        config.storage.connection_string = value;
    }
}
