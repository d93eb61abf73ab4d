//! Admin / manager user-id allow-list.

use serde::Deserialize;

/// Users exempt from blacklist/friend/group-membership checks in SendGuard.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ManagerConfig {
    /// System manager / admin user IDs.
    #[serde(default)]
    pub user_id: Vec<String>,
}

impl ManagerConfig {
    pub fn is_manager(&self, user_id: &str) -> bool {
        self.user_id.iter().any(|id| id == user_id)
    }
}
