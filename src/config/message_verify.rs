//! Single-chat friend-verification toggle.

use serde::Deserialize;

/// Controls whether SendGuard enforces the friend relationship on single-chat sends.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageVerifyConfig {
    /// When true, a rank-0 sender must be friends with the recipient to send.
    #[serde(default)]
    pub friend_verify: bool,
}

impl Default for MessageVerifyConfig {
    fn default() -> Self {
        Self {
            friend_verify: false,
        }
    }
}
