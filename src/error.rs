//! Unified error handling for the dispatch/push pipeline.
//!
//! This module provides error hierarchies for each pipeline stage, with
//! automatic conversions and metric labeling.

use thiserror::Error;

// ============================================================================
// SendGuard errors (send-path validation)
// ============================================================================

/// Errors returned by `SendGuard::send`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("request arguments invalid: {0}")]
    ArgsInvalid(String),

    #[error("sender is blocked by recipient")]
    BlockedByPeer,

    #[error("sender and recipient are not friends")]
    NotPeersFriend,

    #[error("group is already dismissed")]
    DismissedAlready,

    #[error("sender is not a member of the group")]
    NotInGroupYet,

    #[error("sender is muted in the group until {mute_end_time}")]
    MutedInGroup { mute_end_time: i64 },

    #[error("group is globally muted")]
    MutedGroup,

    #[error("message rejected by sensitive-word filter")]
    SensitiveWordFailed,

    #[error("send rate limited, retry after {ttl_secs}s")]
    SendMsgRateLimited { ttl_secs: i64 },

    #[error("recipient has disabled receiving this message")]
    MessageReadDisabled,

    #[error("sender lacks permission for this operation")]
    NoPermission,

    #[error("transient network error: {0}")]
    Network(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SendError {
    /// Get a static error code string for metrics labeling and for the
    /// external error-code surface the caller sees.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ArgsInvalid(_) => "args_invalid",
            Self::BlockedByPeer => "blocked_by_peer",
            Self::NotPeersFriend => "not_peers_friend",
            Self::DismissedAlready => "dismissed_already",
            Self::NotInGroupYet => "not_in_group_yet",
            Self::MutedInGroup { .. } => "muted_in_group",
            Self::MutedGroup => "muted_group",
            Self::SensitiveWordFailed => "sensitive_word_failed",
            Self::SendMsgRateLimited { .. } => "send_msg_rate_limited",
            Self::MessageReadDisabled => "message_read_disabled",
            Self::NoPermission => "no_permission",
            Self::Network(_) => "network",
            Self::Internal(_) => "internal",
        }
    }

    /// True for caller-visible validation failures (nothing written to the
    /// bus), false for transient infra noise.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Network(_) | Self::Internal(_))
    }
}

pub type SendResult<T> = Result<T, SendError>;

// ============================================================================
// LocalCache errors
// ============================================================================

/// Errors from the hash-versioned local caches.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("upstream hash rpc failed: {0}")]
    HashRpcFailed(String),

    #[error("upstream refresh rpc failed: {0}")]
    RefreshRpcFailed(String),
}

impl CacheError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::HashRpcFailed(_) => "hash_rpc_failed",
            Self::RefreshRpcFailed(_) => "refresh_rpc_failed",
        }
    }
}

// ============================================================================
// Fanout errors
// ============================================================================

/// Errors from the fan-out scheduler. Per-bucket gateway RPC failures are
/// swallowed at the call site; this enum covers failures that abort the
/// whole fan-out rather than just degrading one bucket.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("local cache lookup failed: {0}")]
    CacheUnavailable(#[from] CacheError),

    #[error("discovery backend unavailable: {0}")]
    DiscoveryUnavailable(String),
}

impl FanoutError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::DiscoveryUnavailable(_) => "discovery_unavailable",
        }
    }
}

// ============================================================================
// OfflinePusher errors
// ============================================================================

/// Errors from an `OfflinePusher` provider. Offline-push failures are
/// reported to the merger and increment a metric but never fail the
/// originating send.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("vendor auth failed: {0}")]
    AuthFailed(String),

    #[error("vendor returned code {code}, msg {msg}")]
    VendorError { code: i64, msg: String },
}

impl PushError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::AuthFailed(_) => "auth_failed",
            Self::VendorError { .. } => "vendor_error",
        }
    }

    /// GeTui's "token expired" sentinel.
    pub fn is_getui_token_expired(&self) -> bool {
        matches!(self, Self::VendorError { code: 10001, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_codes() {
        assert_eq!(SendError::BlockedByPeer.error_code(), "blocked_by_peer");
        assert_eq!(
            SendError::MutedInGroup { mute_end_time: 0 }.error_code(),
            "muted_in_group"
        );
        assert_eq!(
            SendError::SendMsgRateLimited { ttl_secs: 5 }.error_code(),
            "send_msg_rate_limited"
        );
    }

    #[test]
    fn send_error_validation_classification() {
        assert!(SendError::BlockedByPeer.is_validation());
        assert!(!SendError::Network("timeout".into()).is_validation());
        assert!(!SendError::Internal("oops".into()).is_validation());
    }

    #[test]
    fn push_error_detects_getui_token_expiry() {
        let expired = PushError::VendorError {
            code: 10001,
            msg: "token expired".into(),
        };
        assert!(expired.is_getui_token_expired());

        let other = PushError::VendorError {
            code: 40001,
            msg: "bad request".into(),
        };
        assert!(!other.is_getui_token_expired());
    }

    #[test]
    fn cache_error_codes() {
        assert_eq!(
            CacheError::HashRpcFailed("x".into()).error_code(),
            "hash_rpc_failed"
        );
    }
}
