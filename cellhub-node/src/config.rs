//! Configuration management for the hub collector
//!
//! Supports loading from TOML files and environment variables.

use cellhub_core::cli::DEFAULT_CLI_PATH;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Complete collector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Local node access
    #[serde(default)]
    pub node: NodeSettings,

    /// Collection cycle
    #[serde(default)]
    pub collector: CollectorSettings,

    /// Shared key-value store export
    #[serde(default)]
    pub store: StoreSettings,

    /// Status page, health and metrics endpoint
    #[serde(default)]
    pub status: StatusSettings,

    /// Self-update from a remote manifest
    #[serde(default)]
    pub updater: UpdaterSettings,
}

impl HubConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HubConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Collection interval cannot be 0".to_string(),
            ));
        }

        if self.node.cli_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "CLI timeout cannot be 0".to_string(),
            ));
        }

        if self.node.cli_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "CLI path cannot be empty".to_string(),
            ));
        }

        if self.store.group.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Store group cannot be empty".to_string(),
            ));
        }

        if self.updater.enabled && self.updater.artifacts.is_empty() {
            return Err(ConfigError::ValidationError(
                "Updater enabled without artifacts to install".to_string(),
            ));
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, output: Option<PathBuf>, interval_secs: Option<u64>) -> Self {
        if let Some(path) = output {
            self.collector.output_path = path;
        }
        if let Some(secs) = interval_secs {
            self.collector.interval_secs = secs;
        }
        self
    }

    /// Apply environment variable overrides to all settings
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("HUB_CLI_PATH") {
            self.node.cli_path = PathBuf::from(path);
        }

        if let Some(secs) = env_parse::<u64>("HUB_CLI_TIMEOUT_SECS") {
            self.node.cli_timeout_secs = secs;
        }

        if let Ok(dir) = std::env::var("HUB_NETWORK_CONFIG_DIR") {
            self.node.network_config_dir = PathBuf::from(dir);
        }

        if let Some(secs) = env_parse::<u64>("HUB_INTERVAL_SECS") {
            self.collector.interval_secs = secs;
        }

        if let Ok(path) = std::env::var("HUB_OUTPUT_PATH") {
            self.collector.output_path = PathBuf::from(path);
        }

        if let Ok(group) = std::env::var("HUB_STORE_GROUP") {
            self.store.group = group;
        }

        if let Some(port) = env_parse::<u16>("HUB_STATUS_PORT") {
            self.status.port = port;
        }

        if let Some(enabled) = env_parse::<bool>("HUB_UPDATER_ENABLED") {
            self.updater.enabled = enabled;
        }

        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Local node access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Node CLI binary
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,

    /// Timeout for a single CLI call in seconds
    #[serde(default = "default_cli_timeout")]
    pub cli_timeout_secs: u64,

    /// Directory holding `<network>.cfg` files
    #[serde(default = "default_network_config_dir")]
    pub network_config_dir: PathBuf,

    /// Process name used for the service uptime lookup
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            cli_timeout_secs: default_cli_timeout(),
            network_config_dir: default_network_config_dir(),
            service_name: default_service_name(),
        }
    }
}

impl NodeSettings {
    pub fn cli_timeout(&self) -> Duration {
        Duration::from_secs(self.cli_timeout_secs)
    }
}

fn default_cli_path() -> PathBuf {
    PathBuf::from(DEFAULT_CLI_PATH)
}

fn default_cli_timeout() -> u64 {
    120
}

fn default_network_config_dir() -> PathBuf {
    PathBuf::from("/opt/cellframe-node/etc/network")
}

fn default_service_name() -> String {
    "cellframe-node".to_string()
}

/// Collection cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// Sleep between cycles in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Snapshot artifact path
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            output_path: default_output_path(),
        }
    }
}

impl CollectorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval() -> u64 {
    30 * 60
}

fn default_output_path() -> PathBuf {
    PathBuf::from("/opt/cellframe-node/var/lib/plugins/hub/output.json")
}

fn default_true() -> bool {
    true
}

/// Shared key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Export each cycle's snapshot to the store
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Group all keys are written to
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group: default_group(),
        }
    }
}

impl StoreSettings {
    /// Convert to cellhub_store::StoreConfig
    pub fn to_store_config(&self) -> cellhub_store::StoreConfig {
        cellhub_store::StoreConfig::new(self.group.clone()).with_enabled(self.enabled)
    }
}

fn default_group() -> String {
    cellhub_store::DEFAULT_GROUP.to_string()
}

/// Status page and monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSettings {
    /// Enable the HTTP server
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind
    #[serde(default = "default_bind_addr")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_status_port")]
    pub port: u16,

    /// Status page path
    #[serde(default = "default_page_path")]
    pub page_path: String,

    /// Health check endpoint path
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_addr(),
            port: default_status_port(),
            page_path: default_page_path(),
            health_path: default_health_path(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl StatusSettings {
    /// Get the listen address
    pub fn listen_addr(&self) -> SocketAddr {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_status_port() -> u16 {
    9091
}

fn default_page_path() -> String {
    "/hub".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// File replaced by an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateArtifact {
    /// Where to download the new content from
    pub url: String,

    /// Local file to overwrite
    pub path: PathBuf,
}

/// Self-update configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterSettings {
    /// Enable the update check task
    #[serde(default)]
    pub enabled: bool,

    /// Check interval in seconds
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,

    /// Local manifest holding the installed `version`
    #[serde(default = "default_local_manifest")]
    pub local_manifest: PathBuf,

    /// Remote manifest holding the published `version`
    #[serde(default = "default_remote_manifest")]
    pub remote_manifest_url: String,

    /// Files downloaded when a newer version is published
    #[serde(default)]
    pub artifacts: Vec<UpdateArtifact>,

    /// CLI arguments that make the host reload the plugin
    #[serde(default = "default_reload_args")]
    pub reload_args: Vec<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_secs: default_interval(),
            local_manifest: default_local_manifest(),
            remote_manifest_url: default_remote_manifest(),
            artifacts: Vec::new(),
            reload_args: default_reload_args(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_local_manifest() -> PathBuf {
    PathBuf::from("/opt/cellframe-node/var/lib/plugins/hub/manifest.json")
}

fn default_remote_manifest() -> String {
    "https://raw.githubusercontent.com/nocdem/cellframehub/refs/heads/main/plugin/manifest.json"
        .to_string()
}

fn default_reload_args() -> Vec<String> {
    vec!["plugin".to_string(), "reload".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}
