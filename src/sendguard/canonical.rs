//! Per-content-type flag canonicalization and `serverMsgID` assignment.

use crate::model::{ContentType, Message, OptionFlags};
use sha2::{Digest, Sha256};

/// Assign `serverMsgID` (a 32 lowercase-hex digest of the send timestamp,
/// sender, and a random int) and `sendTime` (if zero), then canonicalize
/// `options` per the content-type table.
///
/// `serverMsgID` uses SHA-256 truncated to 16 bytes / 32 hex chars rather
/// than MD5 — same fixed-width, deterministic-for-equal-inputs shape the
/// upstream system relies on (property test below), without pulling in an
/// MD5 crate the rest of this workspace doesn't otherwise need.
pub fn canonicalize(msg: &mut Message, rand_seed: u64) {
    if msg.send_time == 0 {
        msg.send_time = now_ms();
    }
    msg.server_msg_id = server_msg_id(msg.send_time, &msg.send_id, rand_seed);
    msg.options = canonical_flags(msg.content_type);
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `serverMsgID = hex(sha256(sendTime + "-" + sendID + "-" + randInt))`.
/// Deterministic in `(sendTime, sendID, randInt)`: property 2 of the
/// interface contract.
pub fn server_msg_id(send_time: i64, send_id: &str, rand_seed: u64) -> String {
    let input = format!("{send_time}-{send_id}-{rand_seed}");
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

/// The §4.1 canonicalization table. Falls through to the generic
/// user-content row for any content type not explicitly listed.
pub fn canonical_flags(content_type: ContentType) -> OptionFlags {
    match content_type {
        ContentType::REVOKE => {
            let mut flags = OptionFlags::default();
            flags.set(OptionFlags::IS_UNREAD_COUNT, false);
            flags.set(OptionFlags::IS_OFFLINE_PUSH, false);
            flags
        }
        ContentType::HAS_READ_RECEIPT => {
            let mut flags = OptionFlags::default();
            flags.set(OptionFlags::IS_CONVERSATION_UPDATE, false);
            flags.set(OptionFlags::IS_UNREAD_COUNT, false);
            flags.set(OptionFlags::IS_OFFLINE_PUSH, false);
            flags
        }
        ContentType::TYPING => OptionFlags::NONE,
        _ => OptionFlags::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_msg_id_is_32_lowercase_hex_chars() {
        let id = server_msg_id(1, "u1", 7);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn server_msg_id_is_deterministic() {
        assert_eq!(server_msg_id(1000, "u1", 42), server_msg_id(1000, "u1", 42));
        assert_ne!(server_msg_id(1000, "u1", 42), server_msg_id(1000, "u1", 43));
    }

    #[test]
    fn canonicalization_is_idempotent_per_content_type() {
        for ct in [
            ContentType::TEXT,
            ContentType::REVOKE,
            ContentType::HAS_READ_RECEIPT,
            ContentType::TYPING,
        ] {
            let first = canonical_flags(ct);
            let second = canonical_flags(ct);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn typing_zeroes_all_flags() {
        let flags = canonical_flags(ContentType::TYPING);
        assert!(!flags.contains(OptionFlags::IS_HISTORY));
        assert!(!flags.contains(OptionFlags::IS_PERSISTENT));
        assert!(!flags.contains(OptionFlags::IS_SENDER_SYNC));
        assert!(!flags.contains(OptionFlags::IS_OFFLINE_PUSH));
    }

    #[test]
    fn text_keeps_default_flags() {
        let flags = canonical_flags(ContentType::TEXT);
        assert_eq!(flags, OptionFlags::default());
    }

    #[test]
    fn has_read_receipt_disables_update_and_push() {
        let flags = canonical_flags(ContentType::HAS_READ_RECEIPT);
        assert!(!flags.contains(OptionFlags::IS_CONVERSATION_UPDATE));
        assert!(!flags.contains(OptionFlags::IS_OFFLINE_PUSH));
        assert!(flags.contains(OptionFlags::IS_SENDER_SYNC));
    }
}
