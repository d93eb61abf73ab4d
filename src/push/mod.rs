//! Offline-push provider contract and the title/body derivation + skip
//! matrix shared by every provider.

pub mod dummy;
pub mod fcm;
pub mod getui;
pub mod jpush;

use crate::error::PushError;
use crate::model::{AtMarker, ContentType, Message, OfflinePushEx, OfflinePushOpts, SessionTypeTag};
use async_trait::async_trait;

/// `Push(onlineIDs, offlineIDs, title, body, opts) -> err`. Providers are
/// internally stateful (token caches) but externally stateless.
#[async_trait]
pub trait OfflinePusher: Send + Sync {
    /// Metrics label; also the `push.enable` config value this provider
    /// answers to.
    fn name(&self) -> &'static str;

    async fn push(
        &self,
        online_ids: &[String],
        offline_ids: &[String],
        title: &str,
        body: &str,
        opts: &OfflinePushOpts,
    ) -> Result<(), PushError>;
}

/// Custom-subtype tag carried in `content` for `ContentType::CUSTOM` when
/// the subtype itself decides push eligibility. Parsed best-effort; absent
/// or unparseable content never matches the skip set.
#[derive(Debug, serde::Deserialize, Default)]
struct CustomSubtype {
    #[serde(default)]
    custom_type: i64,
}

/// Content-type tags treated as pure notifications: never worth an offline
/// push, since the recipient has nothing actionable to read without the
/// live session that produced them.
const NOTIFICATION_CONTENT_TYPES: &[ContentType] = &[
    ContentType::SIGNALING_NOTIFICATION,
    ContentType::MEMBER_QUIT_NOTIFICATION,
    ContentType::MEMBER_KICKED_NOTIFICATION,
    ContentType::GROUP_DISMISSED_NOTIFICATION,
];

/// Drop the offline push entirely for these content types/subtypes.
pub fn should_skip_offline_push(content_type: ContentType, content: &[u8]) -> bool {
    if NOTIFICATION_CONTENT_TYPES.contains(&content_type) {
        return true;
    }
    if content_type == ContentType::TYPING {
        return true;
    }
    if content_type == ContentType::CUSTOM {
        let subtype = serde_json::from_slice::<CustomSubtype>(content).unwrap_or_default();
        if matches!(subtype.custom_type, 5000 | 5001) {
            return true;
        }
    }
    false
}

fn default_title_for(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::TEXT => "[New message]",
        ContentType::PICTURE => "[Picture]",
        ContentType::VOICE => "[Voice message]",
        ContentType::VIDEO => "[Video]",
        ContentType::CARD => "[Contact card]",
        ContentType::FILE => "[File]",
        ContentType::SIGNALING_NOTIFICATION => "[Call]",
        _ => "[New message]",
    }
}

/// `getOfflinePushInfos`: derive `(title, body)` for one recipient.
/// `recipient` is an explicit parameter rather than a closed-over variable,
/// so `AtText` classification cannot drift to the wrong user across a loop.
pub fn title_and_body_for(msg: &Message, recipient: &str, at_user_ids: &[String], at_all: bool) -> (String, String) {
    if let Some(title) = msg.offline_push_info.as_ref().and_then(|info| info.title.clone()) {
        let body = msg
            .offline_push_info
            .as_ref()
            .and_then(|info| info.desc.clone())
            .filter(|desc| !desc.is_empty())
            .unwrap_or_else(|| title.clone());
        return (title, body);
    }

    let title = if msg.content_type == ContentType::AT_TEXT {
        let mentioned = crate::sendguard::classify_at_text(at_all, at_user_ids, recipient) != AtMarker::None;
        if mentioned {
            "[someone @you]".to_string()
        } else {
            "[Group message]".to_string()
        }
    } else {
        default_title_for(msg.content_type).to_string()
    };

    (title.clone(), title)
}

/// Build `opts.ex` for an `OfflineRequest`.
pub fn build_offline_push_ex(msg: &Message, conversation_id: &str) -> OfflinePushEx {
    OfflinePushEx {
        conversation_id: conversation_id.to_string(),
        session_type: Some(SessionTypeTag::from(msg.session_type)),
        content_type: msg.content_type.0,
        server_msg_id: msg.server_msg_id.clone(),
        client_msg_id: msg.client_msg_id.clone(),
        sender_platform_id: msg.sender_platform_id,
        sender_face_url: None,
    }
}
