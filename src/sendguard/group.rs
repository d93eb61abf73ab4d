//! Group-chat validation: dismiss/membership/mute checks plus BrushLimit,
//! applied in the order specified by the send-path state machine.

use crate::config::ManagerConfig;
use crate::error::SendError;
use crate::model::{ContentType, SenderRights};
use crate::sendguard::brushlimit::{self, BrushConfig, BrushOutcome};
use crate::sendguard::collaborators::{GroupDirectory, GroupKind, GroupStatus, MemberRole};
use crate::store::SharedStore;

/// Whether the caller's content type is the group-dismissed notification
/// itself, which must pass even once `status == Dismissed`.
fn is_dismiss_notification(content_type: ContentType) -> bool {
    content_type == ContentType::GROUP_DISMISSED_NOTIFICATION
}

#[allow(clippy::too_many_arguments)]
pub async fn validate(
    directory: &dyn GroupDirectory,
    store: &dyn SharedStore,
    brush_config: &BrushConfig,
    manager: &ManagerConfig,
    group_id: &str,
    send_id: &str,
    content_type: ContentType,
    rights: SenderRights,
    is_system_message: bool,
) -> Result<(), SendError> {
    let group = directory
        .group_info(group_id)
        .await
        .ok_or(SendError::NotInGroupYet)?;

    if group.status == GroupStatus::Dismissed && !is_dismiss_notification(content_type) {
        return Err(SendError::DismissedAlready);
    }

    if group.kind == GroupKind::Super {
        return Ok(());
    }

    if manager.is_manager(send_id) || content_type.is_notification() {
        return Ok(());
    }

    let membership = directory
        .membership(group_id, send_id)
        .await
        .ok_or(SendError::NotInGroupYet)?;

    if membership.role == MemberRole::Owner || membership.role == MemberRole::Admin {
        return Ok(());
    }

    if rights != SenderRights::Ordinary {
        return Ok(());
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    if membership.mute_end_time >= now {
        return Err(SendError::MutedInGroup {
            mute_end_time: membership.mute_end_time,
        });
    }
    if group.status == GroupStatus::Muted {
        return Err(SendError::MutedGroup);
    }

    if !is_system_message {
        match brushlimit::check(store, brush_config, send_id)
            .await
            .map_err(|e| SendError::Network(e.0))?
        {
            BrushOutcome::Allowed => {}
            BrushOutcome::Muted { ttl_secs } => {
                return Err(SendError::SendMsgRateLimited { ttl_secs });
            }
        }
    }

    Ok(())
}
