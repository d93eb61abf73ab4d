//! Gateway discovery and the gateway RPC contract.

use crate::model::{Message, SinglePushResult};
use async_trait::async_trait;
use std::sync::Arc;

/// `SuperGroupOnlineBatchPushOneMsg`: push one message to a batch of users
/// known to be routed through this gateway connection.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn super_group_online_batch_push_one_msg(
        &self,
        msg: &Message,
        user_ids: &[String],
    ) -> anyhow::Result<Vec<SinglePushResult>>;
}

/// Discovery abstracts over the two bucketing strategies named in the
/// external-interfaces contract: k8s consistent-hash routing, and
/// zookeeper broadcast-to-all.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// k8s mode: consistent-hash a user onto a gateway host.
    fn hash_to_gateway_host(&self, user_id: &str) -> String;
    /// k8s mode: resolve a host name to its connection.
    async fn get_conn(&self, host: &str) -> Option<Arc<dyn GatewayClient>>;
    /// zookeeper mode: fetch every current connection for the service.
    async fn get_conns(&self, service_name: &str) -> Vec<Arc<dyn GatewayClient>>;
}

/// Gateway client that answers every push with an empty result set. Used as
/// the default wiring until a real gateway RPC client is configured.
pub struct NullGatewayClient;

#[async_trait]
impl GatewayClient for NullGatewayClient {
    async fn super_group_online_batch_push_one_msg(
        &self,
        _msg: &Message,
        _user_ids: &[String],
    ) -> anyhow::Result<Vec<SinglePushResult>> {
        Ok(Vec::new())
    }
}

/// Discovery backend with no live gateway connections. Every bucket falls
/// back to [`NullGatewayClient`]; real deployments supply a discovery
/// implementation backed by the gateway RPC service.
pub struct NullDiscovery {
    conn: Arc<dyn GatewayClient>,
}

impl Default for NullDiscovery {
    fn default() -> Self {
        Self {
            conn: Arc::new(NullGatewayClient),
        }
    }
}

#[async_trait]
impl Discovery for NullDiscovery {
    fn hash_to_gateway_host(&self, _user_id: &str) -> String {
        "unconfigured".to_string()
    }

    async fn get_conn(&self, _host: &str) -> Option<Arc<dyn GatewayClient>> {
        Some(Arc::clone(&self.conn))
    }

    async fn get_conns(&self, _service_name: &str) -> Vec<Arc<dyn GatewayClient>> {
        vec![Arc::clone(&self.conn)]
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use dashmap::DashMap;
    use parking_lot::Mutex;

    /// Deterministic in-memory gateway: records every push it receives and
    /// returns a caller-configured result set.
    pub struct RecordingGateway {
        pub results: Mutex<Vec<SinglePushResult>>,
        pub received: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingGateway {
        pub fn new(results: Vec<SinglePushResult>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GatewayClient for RecordingGateway {
        async fn super_group_online_batch_push_one_msg(
            &self,
            _msg: &Message,
            user_ids: &[String],
        ) -> anyhow::Result<Vec<SinglePushResult>> {
            self.received.lock().push(user_ids.to_vec());
            Ok(self.results.lock().clone())
        }
    }

    /// k8s-mode discovery: single fixed host, single connection.
    pub struct SingleHostDiscovery {
        pub host: String,
        pub conn: Arc<dyn GatewayClient>,
    }

    #[async_trait]
    impl Discovery for SingleHostDiscovery {
        fn hash_to_gateway_host(&self, _user_id: &str) -> String {
            self.host.clone()
        }

        async fn get_conn(&self, host: &str) -> Option<Arc<dyn GatewayClient>> {
            (host == self.host).then(|| Arc::clone(&self.conn))
        }

        async fn get_conns(&self, _service_name: &str) -> Vec<Arc<dyn GatewayClient>> {
            vec![Arc::clone(&self.conn)]
        }
    }

    /// k8s-mode discovery with a caller-supplied hash function, to exercise
    /// multi-bucket fanout.
    pub struct MultiHostDiscovery {
        pub hash_fn: Box<dyn Fn(&str) -> String + Send + Sync>,
        pub conns: DashMap<String, Arc<dyn GatewayClient>>,
    }

    #[async_trait]
    impl Discovery for MultiHostDiscovery {
        fn hash_to_gateway_host(&self, user_id: &str) -> String {
            (self.hash_fn)(user_id)
        }

        async fn get_conn(&self, host: &str) -> Option<Arc<dyn GatewayClient>> {
            self.conns.get(host).map(|c| Arc::clone(c.value()))
        }

        async fn get_conns(&self, _service_name: &str) -> Vec<Arc<dyn GatewayClient>> {
            self.conns.iter().map(|c| Arc::clone(c.value())).collect()
        }
    }
}
