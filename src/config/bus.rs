//! Message log / consumer configuration.

use serde::Deserialize;

/// Configuration for the `MsgToPush` log topic and its consumer group.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Broker address list (informational; the broker itself is an external collaborator).
    #[serde(default = "default_addr")]
    pub addr: Vec<String>,
    /// Topic carrying vetted messages for fanout.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Consumer group id for the push consumer.
    #[serde(default = "default_group")]
    pub consumer_group: String,
    /// Maximum age, in milliseconds, a message may have before the consumer drops it
    /// instead of fanning it out (prevents catch-up storms after an outage).
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: i64,
    /// Size of the bounded worker pool the consumer hands records to.
    #[serde(default = "default_worker_pool")]
    pub worker_pool_size: usize,
}

fn default_addr() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "MsgToPush".to_string()
}

fn default_group() -> String {
    "push-consumer".to_string()
}

fn default_staleness_ms() -> i64 {
    30_000
}

fn default_worker_pool() -> usize {
    64
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            topic: default_topic(),
            consumer_group: default_group(),
            staleness_ms: default_staleness_ms(),
            worker_pool_size: default_worker_pool(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_staleness_is_30s() {
        assert_eq!(BusConfig::default().staleness_ms, 30_000);
    }

    #[test]
    fn default_topic_name() {
        assert_eq!(BusConfig::default().topic, "MsgToPush");
    }
}
