//! Firebase Cloud Messaging provider.

use crate::error::PushError;
use crate::model::OfflinePushOpts;
use crate::push::OfflinePusher;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a user to their registered FCM device token. Backed by the
/// message store in production; out of scope here.
#[async_trait]
pub trait FcmTokenSource: Send + Sync {
    async fn get_fcm_token(&self, user_id: &str) -> Option<String>;
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct FcmPayload<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<i32>,
}

pub struct FcmPusher {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
    tokens: std::sync::Arc<dyn FcmTokenSource>,
}

impl FcmPusher {
    pub fn new(server_key: String, tokens: std::sync::Arc<dyn FcmTokenSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
            server_key,
            tokens,
        }
    }
}

#[async_trait]
impl OfflinePusher for FcmPusher {
    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn push(
        &self,
        _online_ids: &[String],
        offline_ids: &[String],
        title: &str,
        body: &str,
        opts: &OfflinePushOpts,
    ) -> Result<(), PushError> {
        let data = serde_json::to_value(&opts.ex).unwrap_or(serde_json::Value::Null);

        for user_id in offline_ids {
            let Some(token) = self.tokens.get_fcm_token(user_id).await else {
                warn!(user_id = %user_id, "no fcm token on file, skipping");
                continue;
            };

            let payload = FcmPayload {
                to: &token,
                notification: FcmNotification { title, body },
                data: data.clone(),
                sound: opts.ios_push_sound.as_deref(),
                badge: opts.ios_badge_count,
            };

            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("key={}", self.server_key))
                .json(&payload)
                .send()
                .await
                .map_err(|e| PushError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                warn!(user_id = %user_id, status = %response.status(), "fcm push rejected");
            }
        }

        Ok(())
    }
}
