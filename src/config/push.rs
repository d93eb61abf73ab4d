//! Offline-push provider selection and vendor credentials.

use serde::Deserialize;

/// Which offline-push provider the pipeline is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProvider {
    Dummy,
    Fcm,
    JPush,
    Getui,
}

impl Default for PushProvider {
    fn default() -> Self {
        Self::Dummy
    }
}

/// Offline-push configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PushConfig {
    /// Active provider.
    #[serde(default, rename = "enable")]
    pub enable: PushProvider,
    #[serde(default)]
    pub fcm: FcmConfig,
    #[serde(default)]
    pub jpush: JPushConfig,
    #[serde(default)]
    pub getui: GetuiConfig,
}

/// Firebase Cloud Messaging credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FcmConfig {
    /// Path to the service-account credentials file.
    #[serde(default)]
    pub credentials_path: String,
}

/// JPush vendor credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JPushConfig {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub master_secret: String,
}

/// GeTui ("Vendor-A") credentials and channel config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GetuiConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub app_key: String,
    pub master_secret: String,
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_is_dummy() {
        assert_eq!(PushConfig::default().enable, PushProvider::Dummy);
    }
}
