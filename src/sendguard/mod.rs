//! SendGuard: validates a `SendRequest`, canonicalizes it into a `Message`,
//! and hands the result to the caller for publication to the bus.
//!
//! Dispatch is by `sessionType`: single-chat goes through blacklist/friend/
//! receive-mode checks (`single`), group-chat goes through
//! dismiss/membership/mute/brush checks (`group`). Both paths share
//! canonicalization (`canonical`), rights derivation (`rights`), rate
//! limiting (`brushlimit`) and content filtering (`sensitive`).

pub mod brushlimit;
pub mod canonical;
pub mod collaborators;
pub mod group;
pub mod rights;
pub mod sensitive;
pub mod single;

use crate::config::{ManagerConfig, MessageVerifyConfig};
use crate::error::{SendError, SendResult};
use crate::model::{AtMarker, Message, SenderRights, SessionType};
use crate::sendguard::brushlimit::BrushConfig;
use crate::sendguard::collaborators::{GroupDirectory, ReceiveModePolicy, UserRelations};
use crate::store::SharedStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful `SendGuard::send` call.
#[derive(Debug, Clone)]
pub struct SendAccepted {
    pub server_msg_id: String,
    pub client_msg_id: String,
    pub send_time: i64,
    pub message: Message,
    /// `true` when the recipient's receive-mode preference suppresses
    /// delivery entirely (single-chat `NotReceive`).
    pub suppress_delivery: bool,
}

pub struct SendGuard {
    relations: Arc<dyn UserRelations>,
    receive_mode: Arc<dyn ReceiveModePolicy>,
    group_directory: Arc<dyn GroupDirectory>,
    store: Arc<dyn SharedStore>,
    manager: ManagerConfig,
    message_verify: MessageVerifyConfig,
    brush_config: BrushConfig,
}

impl SendGuard {
    pub fn new(
        relations: Arc<dyn UserRelations>,
        receive_mode: Arc<dyn ReceiveModePolicy>,
        group_directory: Arc<dyn GroupDirectory>,
        store: Arc<dyn SharedStore>,
        manager: ManagerConfig,
        message_verify: MessageVerifyConfig,
        brush_config: BrushConfig,
    ) -> Self {
        Self {
            relations,
            receive_mode,
            group_directory,
            store,
            manager,
            message_verify,
            brush_config,
        }
    }

    /// Validate and canonicalize `req`, returning the accepted message or a
    /// typed validation error. The caller (the bus publisher) is
    /// responsible for writing the returned message to the log.
    pub async fn send(&self, req: crate::model::SendRequest, rand_seed: u64) -> SendResult<SendAccepted> {
        let result = self.send_inner(req, rand_seed).await;
        match &result {
            Ok(_) => crate::metrics::MESSAGES_ACCEPTED.inc(),
            Err(err) => {
                if matches!(err, SendError::SendMsgRateLimited { .. }) {
                    crate::metrics::RATE_LIMITED.inc();
                }
                crate::metrics::MESSAGES_REJECTED
                    .with_label_values(&[err.error_code()])
                    .inc();
            }
        }
        result
    }

    async fn send_inner(&self, req: crate::model::SendRequest, rand_seed: u64) -> SendResult<SendAccepted> {
        if req.send_id.is_empty() {
            return Err(SendError::ArgsInvalid("sendID is empty".into()));
        }
        match req.session_type {
            SessionType::Single | SessionType::Notification => {
                if req.recv_id.is_empty() {
                    return Err(SendError::ArgsInvalid("recvID is empty for single chat".into()));
                }
            }
            SessionType::Group => {
                if req.group_id.as_deref().unwrap_or_default().is_empty() {
                    return Err(SendError::ArgsInvalid("groupID is empty for group chat".into()));
                }
            }
        }

        let rights = rights::parse_sender_rights(req.ex.as_deref());

        let mut message = Message {
            server_msg_id: String::new(),
            client_msg_id: req.client_msg_id,
            seq: 0,
            send_id: req.send_id.clone(),
            recv_id: req.recv_id.clone(),
            group_id: req.group_id.clone(),
            session_type: req.session_type,
            content_type: req.content_type,
            content: req.content,
            send_time: req.send_time,
            sender_platform_id: req.sender_platform_id,
            options: Default::default(),
            offline_push_info: req.offline_push_info,
            ex: req.ex,
        };
        canonical::canonicalize(&mut message, rand_seed);

        let mut suppress_delivery = false;

        match message.session_type {
            SessionType::Single | SessionType::Notification => {
                let outcome = single::validate(
                    self.relations.as_ref(),
                    self.receive_mode.as_ref(),
                    &self.manager,
                    self.message_verify.friend_verify,
                    &message.send_id,
                    &message.recv_id,
                    &message.conversation_key(),
                    message.content_type,
                    rights,
                )
                .await?;
                suppress_delivery = outcome.suppress;
                if outcome.force_no_offline_push {
                    message.options.set(crate::model::OptionFlags::IS_OFFLINE_PUSH, false);
                }
            }
            SessionType::Group => {
                let group_id = message.group_id.clone().unwrap_or_default();
                let is_system_message = message.content_type.is_notification();
                group::validate(
                    self.group_directory.as_ref(),
                    self.store.as_ref(),
                    &self.brush_config,
                    &self.manager,
                    &group_id,
                    &message.send_id,
                    message.content_type,
                    rights,
                    is_system_message,
                )
                .await?;
            }
        }

        if rights == SenderRights::Ordinary && message.content_type.is_sensitive_checked() {
            let text = String::from_utf8_lossy(&message.content).into_owned();
            match sensitive::filter(self.store.as_ref(), &text)
                .await
                .map_err(|e| SendError::Network(e.0))?
            {
                sensitive::FilterOutcome::Clean => {}
                sensitive::FilterOutcome::Rejected => {
                    crate::metrics::SENSITIVE_WORD_HITS.inc();
                    warn!(send_id = %message.send_id, "send rejected by sensitive word filter");
                    return Err(SendError::SensitiveWordFailed);
                }
                sensitive::FilterOutcome::Replaced(masked) => {
                    crate::metrics::SENSITIVE_WORD_HITS.inc();
                    message.content = masked.into_bytes();
                }
            }
        }

        info!(
            server_msg_id = %message.server_msg_id,
            send_id = %message.send_id,
            session_type = ?message.session_type,
            "message accepted by sendguard"
        );

        Ok(SendAccepted {
            server_msg_id: message.server_msg_id.clone(),
            client_msg_id: message.client_msg_id.clone(),
            send_time: message.send_time,
            suppress_delivery,
            message,
        })
    }
}

/// Classify an `AtText` message's `@`-mention marker for one recipient.
/// Per-recipient by design: the upstream system's bug of testing a single
/// captured `recvID` instead of the iterated recipient is not reproduced
/// here.
pub fn classify_at_text(at_all: bool, at_user_ids: &[String], recipient: &str) -> AtMarker {
    let explicitly_mentioned = at_user_ids.iter().any(|id| id == recipient);
    match (at_all, explicitly_mentioned) {
        (true, true) => AtMarker::AtAllAtMe,
        (true, false) => AtMarker::AtAll,
        (false, true) => AtMarker::AtMe,
        (false, false) => AtMarker::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_at_all_only() {
        assert_eq!(classify_at_text(true, &[], "u1"), AtMarker::AtAll);
    }

    #[test]
    fn classify_explicit_list_only() {
        assert_eq!(
            classify_at_text(false, &["u1".to_string()], "u1"),
            AtMarker::AtMe
        );
    }

    #[test]
    fn classify_mixed() {
        assert_eq!(
            classify_at_text(true, &["u1".to_string()], "u1"),
            AtMarker::AtAllAtMe
        );
    }

    #[test]
    fn classify_unrelated_recipient_gets_none() {
        assert_eq!(
            classify_at_text(false, &["u1".to_string()], "u2"),
            AtMarker::None
        );
    }

    #[test]
    fn classify_is_per_recipient_not_global() {
        let at_list = vec!["u1".to_string()];
        assert_eq!(classify_at_text(false, &at_list, "u1"), AtMarker::AtMe);
        assert_eq!(classify_at_text(false, &at_list, "u2"), AtMarker::None);
    }
}
