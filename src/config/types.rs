//! Root configuration struct and server identity.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::{BusConfig, DiscoveryConfig, ManagerConfig, MessageVerifyConfig, PushConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration for the dispatch/push pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity (used in logs and metrics labels).
    pub server: ServerConfig,
    /// Offline-push provider selection and credentials.
    #[serde(default)]
    pub push: PushConfig,
    /// Gateway discovery mode (k8s hash-routing vs. zookeeper broadcast).
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Message log / consumer configuration.
    #[serde(default)]
    pub bus: BusConfig,
    /// Single-chat friend-verification toggle.
    #[serde(default)]
    pub message_verify: MessageVerifyConfig,
    /// Admin/manager user-id allow-list.
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Process name, used in logs (e.g. "impush-ng").
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Inbound send-request HTTP port (default: 8090). This is the minimal
    /// surface that calls `SendGuard::send` and publishes the accepted
    /// message to the bus; a real deployment's chat-api gateway would speak
    /// the same contract from a richer service.
    #[serde(default = "default_ingress_port")]
    pub ingress_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_ingress_port() -> u16 {
    8090
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
