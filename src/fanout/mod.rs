//! Fanout: resolves the recipient set for a message, buckets recipients by
//! gateway host, and issues bounded-parallel batch pushes.

pub mod discovery;

use crate::config::{DiscoveryConfig, DiscoveryMode};
use crate::error::FanoutError;
use crate::fanout::discovery::Discovery;
use crate::localcache::GroupMemberIdCache;
use crate::model::{ContentType, Message, SessionType, SinglePushResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Content-hook seam: may rewrite the recipient set before bucketing. An
/// unset hook is the identity function.
#[async_trait]
pub trait PreSendOnlineHook: Send + Sync {
    async fn rewrite(&self, msg: &Message, user_ids: Vec<String>) -> Vec<String>;
}

pub struct IdentityPreSendOnlineHook;

#[async_trait]
impl PreSendOnlineHook for IdentityPreSendOnlineHook {
    async fn rewrite(&self, _msg: &Message, user_ids: Vec<String>) -> Vec<String> {
        user_ids
    }
}

/// Post-expansion cleanup hooks for the three group-membership-change
/// notification types.
#[async_trait]
pub trait GroupLifecycleHook: Send + Sync {
    async fn delete_member_and_set_conversation_seq(&self, group_id: &str, user_ids: &[String]);
    async fn dismiss_group(&self, group_id: &str);
}

pub struct NoopGroupLifecycleHook;

#[async_trait]
impl GroupLifecycleHook for NoopGroupLifecycleHook {
    async fn delete_member_and_set_conversation_seq(&self, _group_id: &str, _user_ids: &[String]) {}
    async fn dismiss_group(&self, _group_id: &str) {}
}

/// Payload shape for the three membership-change notifications: the
/// departing user ids carried in the notification body.
#[derive(Debug, Deserialize, Default)]
struct MembershipChangePayload {
    #[serde(default)]
    affected_user_ids: Vec<String>,
}

fn parse_affected_user_ids(content: &[u8]) -> Vec<String> {
    serde_json::from_slice::<MembershipChangePayload>(content)
        .map(|p| p.affected_user_ids)
        .unwrap_or_default()
}

pub struct Fanout {
    discovery_mode: DiscoveryMode,
    service_name: String,
    max_fanout_workers: usize,
    discovery: Arc<dyn Discovery>,
    member_cache: Arc<GroupMemberIdCache>,
    pre_send_hook: Arc<dyn PreSendOnlineHook>,
    lifecycle_hook: Arc<dyn GroupLifecycleHook>,
}

impl Fanout {
    pub fn new(
        config: &DiscoveryConfig,
        discovery: Arc<dyn Discovery>,
        member_cache: Arc<GroupMemberIdCache>,
        pre_send_hook: Arc<dyn PreSendOnlineHook>,
        lifecycle_hook: Arc<dyn GroupLifecycleHook>,
    ) -> Self {
        Self {
            discovery_mode: config.mode,
            service_name: config.service_name.clone(),
            max_fanout_workers: config.max_fanout_workers,
            discovery,
            member_cache,
            pre_send_hook,
            lifecycle_hook,
        }
    }

    /// Entry point: `(msg, userIDs)` in. Returns the resolved target list
    /// (post group-membership expansion) alongside the aggregated
    /// `wsResults`, since the merger needs both for its set difference.
    pub async fn dispatch(
        &self,
        msg: &Message,
        user_ids: Vec<String>,
    ) -> Result<(Vec<String>, Vec<SinglePushResult>), FanoutError> {
        let user_ids = self.pre_send_hook.rewrite(msg, user_ids).await;

        let targets = if user_ids.is_empty() && msg.session_type == SessionType::Group {
            self.expand_group_membership(msg).await?
        } else {
            user_ids
        };

        let buckets = self.bucket(&targets).await;
        let results = self.push_buckets(msg, buckets).await;

        Ok((targets, results))
    }

    async fn expand_group_membership(&self, msg: &Message) -> Result<Vec<String>, FanoutError> {
        let group_id = msg.group_id.clone().unwrap_or_default();
        let mut members = self.member_cache.get(&group_id).await?;

        let is_membership_change = matches!(
            msg.content_type,
            ContentType::MEMBER_QUIT_NOTIFICATION
                | ContentType::MEMBER_KICKED_NOTIFICATION
                | ContentType::GROUP_DISMISSED_NOTIFICATION
        );

        if is_membership_change {
            let affected = parse_affected_user_ids(&msg.content);
            for user_id in &affected {
                if !members.contains(user_id) {
                    members.push(user_id.clone());
                }
            }

            match msg.content_type {
                ContentType::MEMBER_QUIT_NOTIFICATION | ContentType::MEMBER_KICKED_NOTIFICATION => {
                    self.lifecycle_hook
                        .delete_member_and_set_conversation_seq(&group_id, &affected)
                        .await;
                }
                ContentType::GROUP_DISMISSED_NOTIFICATION => {
                    self.lifecycle_hook.dismiss_group(&group_id).await;
                }
                _ => unreachable!(),
            }
        }

        Ok(members)
    }

    async fn bucket(&self, targets: &[String]) -> HashMap<String, Vec<String>> {
        match self.discovery_mode {
            DiscoveryMode::K8s => {
                let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
                for user_id in targets {
                    let host = self.discovery.hash_to_gateway_host(user_id);
                    buckets.entry(host).or_default().push(user_id.clone());
                }
                buckets
            }
            DiscoveryMode::Zookeeper => {
                // Every gateway connection gets the full batch; gateways
                // filter by local presence.
                let conns = self.discovery.get_conns(&self.service_name).await;
                let mut buckets = HashMap::new();
                for (i, _conn) in conns.iter().enumerate() {
                    buckets.insert(format!("zk-conn-{i}"), targets.to_vec());
                }
                if conns.is_empty() {
                    buckets.insert(self.service_name.clone(), targets.to_vec());
                }
                buckets
            }
        }
    }

    async fn push_buckets(
        &self,
        msg: &Message,
        buckets: HashMap<String, Vec<String>>,
    ) -> Vec<SinglePushResult> {
        if buckets.is_empty() {
            return Vec::new();
        }

        let worker_cap = (3usize).max(self.max_fanout_workers.min(buckets.len()));
        let semaphore = Arc::new(Semaphore::new(worker_cap));
        let results = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (host, user_ids) in buckets {
            let semaphore = Arc::clone(&semaphore);
            let discovery = Arc::clone(&self.discovery);
            let results = Arc::clone(&results);
            let msg = msg.clone();
            let mode = self.discovery_mode;
            let service_name = self.service_name.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                let conn = match mode {
                    DiscoveryMode::K8s => discovery.get_conn(&host).await,
                    DiscoveryMode::Zookeeper => discovery
                        .get_conns(&service_name)
                        .await
                        .into_iter()
                        .next(),
                };

                let Some(conn) = conn else {
                    crate::metrics::FANOUT_BUCKET_ERRORS.inc();
                    warn!(host = %host, "no gateway connection for bucket");
                    return;
                };

                match conn.super_group_online_batch_push_one_msg(&msg, &user_ids).await {
                    Ok(bucket_results) => {
                        results.lock().extend(bucket_results);
                    }
                    Err(err) => {
                        crate::metrics::FANOUT_BUCKET_ERRORS.inc();
                        warn!(host = %host, error = %err, "gateway rpc failed, bucket swallowed");
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Arc::try_unwrap(results).map(|m| m.into_inner()).unwrap_or_default()
    }
}
