//! Core data types flowing through the dispatch/push pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `sessionType` discriminant on a `Message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    Single,
    Group,
    Notification,
}

/// Content-type tags the pipeline cares about by name; everything else is
/// treated as an opaque user-content type in the canonicalization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentType(pub i32);

impl ContentType {
    pub const TEXT: ContentType = ContentType(101);
    pub const PICTURE: ContentType = ContentType(102);
    pub const VOICE: ContentType = ContentType(103);
    pub const VIDEO: ContentType = ContentType(104);
    pub const FILE: ContentType = ContentType(105);
    pub const AT_TEXT: ContentType = ContentType(106);
    pub const MERGER: ContentType = ContentType(107);
    pub const CARD: ContentType = ContentType(108);
    pub const LOCATION: ContentType = ContentType(109);
    pub const CUSTOM: ContentType = ContentType(110);
    pub const REVOKE: ContentType = ContentType(111);
    pub const TYPING: ContentType = ContentType(113);
    pub const QUOTE: ContentType = ContentType(114);
    pub const HAS_READ_RECEIPT: ContentType = ContentType(133);
    pub const SIGNALING_NOTIFICATION: ContentType = ContentType(1400);
    pub const MEMBER_QUIT_NOTIFICATION: ContentType = ContentType(1501);
    pub const MEMBER_KICKED_NOTIFICATION: ContentType = ContentType(1508);
    pub const GROUP_DISMISSED_NOTIFICATION: ContentType = ContentType(1510);

    /// The distilled user-content types eligible for sensitive-word filtering.
    pub fn is_sensitive_checked(self) -> bool {
        matches!(self, Self::TEXT | Self::AT_TEXT | Self::QUOTE)
    }

    /// Notification content types (>= 1000 by this system's convention) skip
    /// blacklist/friend/membership/mute/brush checks.
    pub fn is_notification(self) -> bool {
        self.0 >= 1000
    }
}

/// `options` bit set on a `Message`, canonicalized per content-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionFlags(u16);

impl OptionFlags {
    pub const IS_HISTORY: OptionFlags = OptionFlags(1 << 0);
    pub const IS_PERSISTENT: OptionFlags = OptionFlags(1 << 1);
    pub const IS_SENDER_SYNC: OptionFlags = OptionFlags(1 << 2);
    pub const IS_CONVERSATION_UPDATE: OptionFlags = OptionFlags(1 << 3);
    pub const IS_SENDER_CONVERSATION_UPDATE: OptionFlags = OptionFlags(1 << 4);
    pub const IS_UNREAD_COUNT: OptionFlags = OptionFlags(1 << 5);
    pub const IS_OFFLINE_PUSH: OptionFlags = OptionFlags(1 << 6);

    pub const NONE: OptionFlags = OptionFlags(0);

    pub fn contains(self, other: OptionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, flag: OptionFlags, value: bool) {
        if value {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    pub fn union(self, other: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for OptionFlags {
    type Output = OptionFlags;
    fn bitor(self, rhs: OptionFlags) -> OptionFlags {
        self.union(rhs)
    }
}

impl Default for OptionFlags {
    fn default() -> Self {
        Self::IS_HISTORY
            | Self::IS_PERSISTENT
            | Self::IS_SENDER_SYNC
            | Self::IS_CONVERSATION_UPDATE
            | Self::IS_SENDER_CONVERSATION_UPDATE
            | Self::IS_UNREAD_COUNT
            | Self::IS_OFFLINE_PUSH
    }
}

/// Rank derived from `ex`'s boolean-string triple. Higher ranks bypass more
/// SendGuard checks; see `sendguard::rights`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SenderRights {
    Ordinary = 0,
    AnchorAuth = 1,
    OperationAuth = 2,
    HighAuth = 3,
}

impl SenderRights {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Optional offline-push display overrides supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflinePushInfo {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub ios_badge_count: Option<i32>,
    pub ios_push_sound: Option<String>,
    pub ex: Option<String>,
}

/// The unit flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub server_msg_id: String,
    pub client_msg_id: String,
    pub seq: i64,
    pub send_id: String,
    pub recv_id: String,
    pub group_id: Option<String>,
    pub session_type: SessionType,
    pub content_type: ContentType,
    pub content: Vec<u8>,
    pub send_time: i64,
    pub sender_platform_id: i32,
    pub options: OptionFlags,
    pub offline_push_info: Option<OfflinePushInfo>,
    pub ex: Option<String>,
}

impl Message {
    /// Canonical partition/conversation key: `single:min(a,b):max(a,b)` for
    /// pairs, `group:<groupID>` for groups.
    pub fn conversation_key(&self) -> String {
        match self.session_type {
            SessionType::Group => format!(
                "group:{}",
                self.group_id.as_deref().unwrap_or_default()
            ),
            SessionType::Single | SessionType::Notification => {
                if let Some(group_id) = &self.group_id {
                    return format!("group:{group_id}");
                }
                let (a, b) = (self.send_id.as_str(), self.recv_id.as_str());
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                format!("single:{lo}:{hi}")
            }
        }
    }
}

/// A send request before `serverMsgID`/`sendTime` assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub client_msg_id: String,
    pub send_id: String,
    pub recv_id: String,
    pub group_id: Option<String>,
    pub session_type: SessionType,
    pub content_type: ContentType,
    pub content: Vec<u8>,
    pub send_time: i64,
    pub sender_platform_id: i32,
    pub options: OptionFlags,
    pub offline_push_info: Option<OfflinePushInfo>,
    pub ex: Option<String>,
}

/// Per-user, per-platform delivery result returned by a gateway RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform_id: i32,
    /// `-2` means "session registered but currently backgrounded".
    pub result_code: i32,
}

pub const PLATFORM_MOBILE: i32 = 1;
pub const PLATFORM_WEB: i32 = 2;
pub const PLATFORM_PC: i32 = 3;

/// Per-recipient delivery outcome from a single gateway bucket push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePushResult {
    pub user_id: String,
    pub online_push: bool,
    pub per_platform: Vec<PlatformResult>,
}

/// Recipient set plus gateway-host bucketing, derived per message.
#[derive(Debug, Clone, Default)]
pub struct FanoutPlan {
    pub targets: Vec<String>,
    pub buckets: HashMap<String, Vec<String>>,
}

/// `{onlineIDs, offlineIDs, title, body, opts}` handed to an `OfflinePusher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineRequest {
    pub online_ids: Vec<String>,
    pub offline_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub opts: OfflinePushOpts,
}

/// `opts` side of an `OfflineRequest`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflinePushOpts {
    pub signal: bool,
    pub ios_badge_count: Option<i32>,
    pub ios_push_sound: Option<String>,
    pub ex: OfflinePushEx,
}

/// `opts.ex` JSON blob carried alongside an offline push.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflinePushEx {
    pub conversation_id: String,
    pub session_type: Option<SessionTypeTag>,
    pub content_type: i32,
    pub server_msg_id: String,
    pub client_msg_id: String,
    pub sender_platform_id: i32,
    pub sender_face_url: Option<String>,
}

/// `SessionType` serialized as its integer tag for the `ex` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum SessionTypeTag {
    Single = 1,
    Group = 2,
    Notification = 3,
}

impl From<SessionType> for SessionTypeTag {
    fn from(value: SessionType) -> Self {
        match value {
            SessionType::Single => Self::Single,
            SessionType::Group => Self::Group,
            SessionType::Notification => Self::Notification,
        }
    }
}

/// `@`-mention classification result for `AtText` content, computed
/// per-recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtMarker {
    AtAll,
    AtMe,
    AtAllAtMe,
    None,
}

/// Payload shape carried in `content` for `ContentType::AT_TEXT`: the
/// explicitly mentioned user ids plus the `@all` flag.
#[derive(Debug, Deserialize, Default)]
struct AtTextPayload {
    #[serde(default)]
    at_user_ids: Vec<String>,
    #[serde(default)]
    is_at_all: bool,
}

/// Best-effort parse of an `AtText` message's `@`-mention targets. Absent or
/// unparseable content yields no mentions rather than an error.
pub fn parse_at_text_targets(content: &[u8]) -> (Vec<String>, bool) {
    serde_json::from_slice::<AtTextPayload>(content)
        .map(|p| (p.at_user_ids, p.is_at_all))
        .unwrap_or_default()
}
