//! Gateway discovery configuration.

use serde::Deserialize;

/// How the fanout scheduler locates gateway connections for a recipient set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Consistent-hash the userID onto a gateway host, look up one connection per host.
    K8s,
    /// Fetch every live gateway connection for the service and broadcast to each.
    Zookeeper,
}

impl Default for DiscoveryMode {
    fn default() -> Self {
        Self::K8s
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Discovery mode.
    #[serde(default)]
    pub mode: DiscoveryMode,
    /// Gateway RPC service name (used by the zookeeper mode to enumerate connections).
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Maximum number of concurrent per-bucket RPCs during fanout.
    #[serde(default = "default_max_workers")]
    pub max_fanout_workers: usize,
}

fn default_service_name() -> String {
    "gateway".to_string()
}

fn default_max_workers() -> usize {
    10
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::default(),
            service_name: default_service_name(),
            max_fanout_workers: default_max_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_k8s() {
        assert_eq!(DiscoveryConfig::default().mode, DiscoveryMode::K8s);
    }

    #[test]
    fn default_max_workers_value() {
        assert_eq!(DiscoveryConfig::default().max_fanout_workers, 10);
    }
}
