//! JPush vendor provider. Pushes by alias (= userID), one batched call per
//! offline set.

use crate::error::PushError;
use crate::model::OfflinePushOpts;
use crate::push::OfflinePusher;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Audience<'a> {
    alias: &'a [String],
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    alert: &'a str,
}

#[derive(Debug, Serialize)]
struct IosOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<i32>,
}

#[derive(Debug, Serialize)]
struct JPushOptions<'a> {
    ios: IosOptions<'a>,
}

#[derive(Debug, Serialize)]
struct JPushRequest<'a> {
    platform: &'static str,
    audience: Audience<'a>,
    notification: Notification<'a>,
    message: serde_json::Value,
    options: JPushOptions<'a>,
}

pub struct JPushPusher {
    client: reqwest::Client,
    endpoint: String,
    app_key: String,
    master_secret: String,
}

impl JPushPusher {
    pub fn new(app_key: String, master_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: "https://api.jpush.cn/v3/push".to_string(),
            app_key,
            master_secret,
        }
    }
}

#[async_trait]
impl OfflinePusher for JPushPusher {
    fn name(&self) -> &'static str {
        "jpush"
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

        let request = JPushRequest {
            platform: "all",
            audience: Audience { alias: offline_ids },
            notification: Notification { alert: title },
            message: serde_json::json!({ "msg_content": body, "extras": opts.ex }),
            options: JPushOptions {
                ios: IosOptions {
                    sound: opts.ios_push_sound.as_deref(),
                    badge: opts.ios_badge_count,
                },
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.app_key, Some(&self.master_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let code = response.status().as_u16() as i64;
            let msg = response.text().await.unwrap_or_default();
            return Err(PushError::VendorError { code, msg });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_offline_set_is_a_noop() {
        let pusher = JPushPusher::new("key".into(), "secret".into());
        let result = pusher.push(&[], &[], "t", "b", &OfflinePushOpts::default()).await;
        assert!(result.is_ok());
    }
}
