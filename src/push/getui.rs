//! GeTui ("Vendor-A") provider: two-phase auth + push protocol with a
//! shared, TTL-bounded token cache.

use crate::error::PushError;
use crate::model::OfflinePushOpts;
use crate::push::OfflinePusher;
use crate::store::SharedStore;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Token is considered expired this far before its real expiry, to absorb
/// clock skew and in-flight request latency.
const TOKEN_SAFETY_MARGIN_MS: i64 = 60_000;
const TOKEN_EXPIRED_CODE: i64 = 10001;

/// GeTui's fixed Huawei (HW) channel defaults for this app's notification
/// category.
const HW_CHANNEL_ID: &str = "RingRing4";
const HW_CHANNEL_SOUND: &str = "/raw/ring001";
/// Xiaomi (XM) uses a distinct channel id from HW's; the vendor reserves
/// this one for system-priority notifications.
const XM_CHANNEL_ID: &str = "high_system";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn token_store_key(app_key: &str) -> String {
    format!("getui_token:{app_key}")
}

#[derive(Debug, Deserialize)]
struct VendorEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthData {
    token: String,
    expire_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct TaskData {
    #[serde(rename = "taskID")]
    task_id: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
struct CachedToken {
    token: String,
    expire_at_ms: i64,
}

pub struct GetuiPusher {
    client: reqwest::Client,
    base_url: String,
    app_key: String,
    master_secret: String,
    channel_id: String,
    channel_name: String,
    store: Arc<dyn SharedStore>,
    refresh_lock: AsyncMutex<()>,
}

impl GetuiPusher {
    pub fn new(
        base_url: String,
        app_key: String,
        master_secret: String,
        channel_id: String,
        channel_name: String,
        store: Arc<dyn SharedStore>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url,
            app_key,
            master_secret,
            channel_id,
            channel_name,
            store,
            refresh_lock: AsyncMutex::new(()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url.trim_end_matches('/'), self.app_key, path)
    }

    async fn cached_token(&self) -> Option<String> {
        let raw = self.store.get(&token_store_key(&self.app_key)).await.ok()??;
        let cached: CachedToken = serde_json::from_str(&raw).ok()?;
        if now_ms() < cached.expire_at_ms - TOKEN_SAFETY_MARGIN_MS {
            Some(cached.token)
        } else {
            None
        }
    }

    async fn clear_token(&self) {
        let _ = self.store.del(&token_store_key(&self.app_key)).await;
    }

    /// Single-flight per instance (one instance per `appKey`): the lock
    /// serializes refreshes, and the cache is rechecked after acquiring it
    /// so concurrent callers don't all re-auth.
    async fn get_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        self.auth().await
    }

    async fn auth(&self) -> Result<String, PushError> {
        let timestamp = now_ms();
        let sign = {
            let mut hasher = Sha256::new();
            hasher.update(self.app_key.as_bytes());
            hasher.update(timestamp.to_string().as_bytes());
            hasher.update(self.master_secret.as_bytes());
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        };

        let response = self
            .client
            .post(self.url("/auth"))
            .json(&serde_json::json!({
                "sign": sign,
                "timestamp": timestamp.to_string(),
                "appkey": self.app_key,
            }))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let envelope: VendorEnvelope<AuthData> = response
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if envelope.code != 0 {
            return Err(PushError::AuthFailed(format!("code {}, msg {}", envelope.code, envelope.msg)));
        }
        let data = envelope.data.ok_or_else(|| PushError::AuthFailed("auth response missing data".into()))?;
        let expire_at_ms: i64 = data.expire_time.parse().unwrap_or(timestamp);

        let cached = CachedToken {
            token: data.token.clone(),
            expire_at_ms,
        };
        let _ = self
            .store
            .set(&token_store_key(&self.app_key), &serde_json::to_string(&cached).unwrap())
            .await;

        Ok(data.token)
    }

    /// Builds the `push_channel.android.ups` block to mirror the vendor's
    /// own `Options{HW, XM, VV}` nesting: each vendor channel gets its own
    /// dotted-path keys and its own channel-id default rather than one
    /// shared value reused across HW/XM/VV.
    fn payload(&self, title: &str, body: &str, opts: &OfflinePushOpts) -> serde_json::Value {
        let notification = serde_json::json!({
            "title": title,
            "body": body,
            "channelID": self.channel_id,
            "channelName": self.channel_name,
            "clickType": "intent",
        });
        let transmission = serde_json::to_string(&notification).unwrap_or_default();

        serde_json::json!({
            "notification": {
                "title": title,
                "body": body,
                "click_type": "intent",
            },
            "push_message": {
                "transmission": serde_json::to_string(&opts.ex).unwrap_or_default(),
            },
            "push_channel": {
                "ios": {
                    "type": "notify",
                    "aps": {
                        "alert": { "title": title, "body": body },
                        "sound": opts.ios_push_sound.clone().unwrap_or_else(|| "default".to_string()),
                        "badge": opts.ios_badge_count.unwrap_or(1),
                    },
                },
                "android": {
                    "ups": {
                        "transmission": transmission,
                        "options": {
                            "HW": {
                                "/message/android/notification/channel_id": HW_CHANNEL_ID,
                                "/message/android/notification/sound": HW_CHANNEL_SOUND,
                                "/message/android/notification/importance": "NORMAL",
                            },
                            "XM": {
                                "/extra.channel_id": XM_CHANNEL_ID,
                            },
                            "VV": {
                                "/classification": 1,
                            },
                        },
                    },
                },
            },
        })
    }

    async fn send_single_batch_alias(&self, token: &str, alias: &str, payload: &serde_json::Value) -> Result<(), PushError> {
        let response = self
            .client
            .post(self.url("/push/single/batch_alias"))
            .header("token", token)
            .json(&serde_json::json!({
                "audience": { "alias": [alias] },
                "settings": {},
                "push_message": payload["push_message"],
                "push_channel": payload["push_channel"],
            }))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let envelope: VendorEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if envelope.code != 0 {
            return Err(PushError::VendorError { code: envelope.code, msg: envelope.msg });
        }
        Ok(())
    }

    async fn send_list(&self, token: &str, offline_ids: &[String], payload: &serde_json::Value) -> Result<(), PushError> {
        let create = self
            .client
            .post(self.url("/push/list/message"))
            .header("token", token)
            .json(&serde_json::json!({
                "request_id": format!("{}", now_ms()),
                "group_name": "im",
                "settings": {},
                "push_message": payload["push_message"],
                "push_channel": payload["push_channel"],
            }))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let create_envelope: VendorEnvelope<TaskData> = create
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if create_envelope.code != 0 {
            return Err(PushError::VendorError { code: create_envelope.code, msg: create_envelope.msg });
        }
        let task = create_envelope
            .data
            .ok_or_else(|| PushError::VendorError { code: -1, msg: "task creation missing data".into() })?;

        let response = self
            .client
            .post(self.url("/push/list/alias"))
            .header("token", token)
            .json(&serde_json::json!({
                "audience": { "alias": offline_ids },
                "taskid": task.task_id,
                "is_async": true,
            }))
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let envelope: VendorEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if envelope.code != 0 {
            return Err(PushError::VendorError { code: envelope.code, msg: envelope.msg });
        }
        Ok(())
    }

    async fn send_once(&self, token: &str, offline_ids: &[String], payload: &serde_json::Value) -> Result<(), PushError> {
        if offline_ids.len() == 1 {
            self.send_single_batch_alias(token, &offline_ids[0], payload).await
        } else {
            self.send_list(token, offline_ids, payload).await
        }
    }
}

#[async_trait]
impl OfflinePusher for GetuiPusher {
    fn name(&self) -> &'static str {
        "getui"
    }

    async fn push(
        &self,
        _online_ids: &[String],
        offline_ids: &[String],
        title: &str,
        body: &str,
        opts: &OfflinePushOpts,
    ) -> Result<(), PushError> {
        if offline_ids.is_empty() {
            return Ok(());
        }

        let payload = self.payload(title, body, opts);
        let token = self.get_token().await?;

        match self.send_once(&token, offline_ids, &payload).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_getui_token_expired() => {
                warn!("getui token expired mid-flight, retrying once after re-auth");
                self.clear_token().await;
                let fresh_token = self.get_token().await?;
                self.send_once(&fresh_token, offline_ids, &payload).await
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn cached_token_key_is_scoped_by_app_key() {
        assert_ne!(token_store_key("a"), token_store_key("b"));
    }

    #[tokio::test]
    async fn stale_cached_token_within_safety_margin_is_treated_as_expired() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let pusher = GetuiPusher::new(
            "http://example.invalid".into(),
            "app1".into(),
            "secret".into(),
            "RingRing4".into(),
            "im".into(),
            store.clone(),
        );

        let cached = CachedToken {
            token: "tok".into(),
            expire_at_ms: now_ms() + 1_000,
        };
        store
            .set(&token_store_key("app1"), &serde_json::to_string(&cached).unwrap())
            .await
            .unwrap();

        assert!(pusher.cached_token().await.is_none());
    }

    #[tokio::test]
    async fn fresh_cached_token_is_reused() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let pusher = GetuiPusher::new(
            "http://example.invalid".into(),
            "app1".into(),
            "secret".into(),
            "RingRing4".into(),
            "im".into(),
            store.clone(),
        );

        let cached = CachedToken {
            token: "tok".into(),
            expire_at_ms: now_ms() + 10 * 60_000,
        };
        store
            .set(&token_store_key("app1"), &serde_json::to_string(&cached).unwrap())
            .await
            .unwrap();

        assert_eq!(pusher.cached_token().await, Some("tok".to_string()));
    }

    #[tokio::test]
    async fn empty_offline_set_never_touches_the_network() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let pusher = GetuiPusher::new(
            "http://example.invalid".into(),
            "app1".into(),
            "secret".into(),
            "RingRing4".into(),
            "im".into(),
            store,
        );
        let result = pusher.push(&[], &[], "t", "b", &OfflinePushOpts::default()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn payload_nests_hw_xm_vv_with_distinct_channel_ids() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let pusher = GetuiPusher::new(
            "http://example.invalid".into(),
            "app1".into(),
            "secret".into(),
            "RingRing4".into(),
            "im".into(),
            store,
        );

        let payload = pusher.payload("title", "body", &OfflinePushOpts::default());
        let options = &payload["push_channel"]["android"]["ups"]["options"];

        assert_eq!(options["HW"]["/message/android/notification/channel_id"], "RingRing4");
        assert_eq!(options["XM"]["/extra.channel_id"], "high_system");
        assert_ne!(options["HW"]["/message/android/notification/channel_id"], options["XM"]["/extra.channel_id"]);
        assert_eq!(options["VV"]["/classification"], 1);

        let transmission = payload["push_channel"]["android"]["ups"]["transmission"].as_str().unwrap();
        let notification: serde_json::Value = serde_json::from_str(transmission).unwrap();
        assert_eq!(notification["channelID"], "RingRing4");
        assert_eq!(notification["channelName"], "im");
    }
}
