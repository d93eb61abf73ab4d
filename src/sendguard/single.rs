//! Single-chat validation: blacklist/friend checks and per-recipient
//! receive mode.

use crate::config::ManagerConfig;
use crate::error::SendError;
use crate::model::{ContentType, SenderRights};
use crate::sendguard::collaborators::{ReceiveMode, ReceiveModePolicy, UserRelations};

/// Content types that always deliver regardless of the recipient's receive
/// mode — carried over from the upstream `ExcludeContentType` exception
/// list, currently just read-receipts.
pub const ALWAYS_DELIVER: &[ContentType] = &[ContentType::HAS_READ_RECEIPT];

/// Validate a single-chat send. Returns `Ok(suppress_delivery)` where
/// `true` means the message is accepted but should not be delivered at all
/// (the `NotReceive` case); `force_no_offline_push` signals
/// `ReceiveNotNotify`.
#[derive(Debug)]
pub struct SingleCheckOutcome {
    pub suppress: bool,
    pub force_no_offline_push: bool,
}

#[allow(clippy::too_many_arguments)]
pub async fn validate(
    relations: &dyn UserRelations,
    receive_mode: &dyn ReceiveModePolicy,
    manager: &ManagerConfig,
    friend_verify_enabled: bool,
    send_id: &str,
    recv_id: &str,
    conversation_id: &str,
    content_type: ContentType,
    rights: SenderRights,
) -> Result<SingleCheckOutcome, SendError> {
    let skip_checks =
        manager.is_manager(send_id) || content_type.is_notification() || rights != SenderRights::Ordinary;

    if !skip_checks {
        if relations.is_blocked(send_id, recv_id).await {
            return Err(SendError::BlockedByPeer);
        }
        if friend_verify_enabled && !relations.are_friends(send_id, recv_id).await {
            return Err(SendError::NotPeersFriend);
        }
    }

    if ALWAYS_DELIVER.contains(&content_type) {
        return Ok(SingleCheckOutcome {
            suppress: false,
            force_no_offline_push: false,
        });
    }

    match receive_mode.receive_mode(recv_id, conversation_id).await {
        ReceiveMode::Receive => Ok(SingleCheckOutcome {
            suppress: false,
            force_no_offline_push: false,
        }),
        ReceiveMode::NotReceive => Ok(SingleCheckOutcome {
            suppress: true,
            force_no_offline_push: false,
        }),
        ReceiveMode::ReceiveNotNotify => Ok(SingleCheckOutcome {
            suppress: false,
            force_no_offline_push: true,
        }),
    }
}
