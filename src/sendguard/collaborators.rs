//! External collaborator contracts SendGuard depends on but does not
//! implement: user relationships, group directory, per-recipient receive
//! mode. Production wiring backs these with RPCs to the user/group/
//! conversation services; tests use the in-memory stubs below.

use async_trait::async_trait;
use std::collections::HashMap;

/// Whether `sender` may reach `recipient` in a single chat.
#[async_trait]
pub trait UserRelations: Send + Sync {
    async fn is_blocked(&self, sender: &str, recipient: &str) -> bool;
    async fn are_friends(&self, a: &str, b: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Normal,
    Muted,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Normal,
    /// Public broadcast group: membership/mute checks are skipped entirely.
    Super,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupInfo {
    pub status: GroupStatus,
    pub kind: GroupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Admin,
    Ordinary,
}

#[derive(Debug, Clone, Copy)]
pub struct Membership {
    pub role: MemberRole,
    /// Unix ms; `>= now` means the member is currently muted.
    pub mute_end_time: i64,
}

/// Group directory: status, kind, and per-user membership lookups.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn group_info(&self, group_id: &str) -> Option<GroupInfo>;
    async fn membership(&self, group_id: &str, user_id: &str) -> Option<Membership>;
}

/// Per-recipient receive-mode preference for single-chat delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    Receive,
    NotReceive,
    ReceiveNotNotify,
}

#[async_trait]
pub trait ReceiveModePolicy: Send + Sync {
    /// Combined global + per-conversation setting for `user_id` w.r.t.
    /// `conversation_id`. Implementations resolve the precedence between
    /// the two internally.
    async fn receive_mode(&self, user_id: &str, conversation_id: &str) -> ReceiveMode;
}

/// In-memory stand-ins for tests and local wiring.
#[derive(Default)]
pub struct StubUserRelations {
    pub blocked: HashMap<(String, String), bool>,
    pub friends: HashMap<(String, String), bool>,
}

fn unordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl StubUserRelations {
    pub fn block(&mut self, sender: &str, recipient: &str) {
        self.blocked.insert((sender.to_string(), recipient.to_string()), true);
    }

    pub fn befriend(&mut self, a: &str, b: &str) {
        self.friends.insert(unordered_pair(a, b), true);
    }
}

#[async_trait]
impl UserRelations for StubUserRelations {
    async fn is_blocked(&self, sender: &str, recipient: &str) -> bool {
        *self
            .blocked
            .get(&(sender.to_string(), recipient.to_string()))
            .unwrap_or(&false)
    }

    async fn are_friends(&self, a: &str, b: &str) -> bool {
        *self.friends.get(&unordered_pair(a, b)).unwrap_or(&false)
    }
}

#[derive(Default)]
pub struct StubGroupDirectory {
    pub groups: HashMap<String, GroupInfo>,
    pub members: HashMap<(String, String), Membership>,
}

impl StubGroupDirectory {
    pub fn add_group(&mut self, group_id: &str, info: GroupInfo) {
        self.groups.insert(group_id.to_string(), info);
    }

    pub fn add_member(&mut self, group_id: &str, user_id: &str, membership: Membership) {
        self.members
            .insert((group_id.to_string(), user_id.to_string()), membership);
    }
}

#[async_trait]
impl GroupDirectory for StubGroupDirectory {
    async fn group_info(&self, group_id: &str) -> Option<GroupInfo> {
        self.groups.get(group_id).copied()
    }

    async fn membership(&self, group_id: &str, user_id: &str) -> Option<Membership> {
        self.members
            .get(&(group_id.to_string(), user_id.to_string()))
            .copied()
    }
}

#[derive(Default)]
pub struct StubReceiveModePolicy {
    pub modes: HashMap<(String, String), ReceiveMode>,
}

impl StubReceiveModePolicy {
    pub fn set(&mut self, user_id: &str, conversation_id: &str, mode: ReceiveMode) {
        self.modes
            .insert((user_id.to_string(), conversation_id.to_string()), mode);
    }
}

#[async_trait]
impl ReceiveModePolicy for StubReceiveModePolicy {
    async fn receive_mode(&self, user_id: &str, conversation_id: &str) -> ReceiveMode {
        *self
            .modes
            .get(&(user_id.to_string(), conversation_id.to_string()))
            .unwrap_or(&ReceiveMode::Receive)
    }
}
