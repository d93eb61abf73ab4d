//! BrushLimit: the anti-flood rate limiter.
//!
//! Deliberately *not* a token-bucket limiter — the upstream system this was
//! carried over from implements a sliding counter with a two-tier mute/ban
//! escalation against a shared KV store, and that shape (not governor's
//! token bucket) is what the invariants below describe. Key names are
//! carried over verbatim because they're part of an existing operational
//! contract (dashboards, manual unmute tooling) rather than invented detail.

use crate::store::SharedStore;
use std::time::Duration;

/// A `brush_config` snapshot. In the real system this is itself fetched
/// from the shared store at a fixed key; callers resolve it once per call
/// (or cache it) and pass it in here.
#[derive(Debug, Clone, Copy)]
pub struct BrushConfig {
    /// Sliding window length, seconds.
    pub brush_time_secs: u64,
    /// Max messages allowed within the window.
    pub brush_limit: i64,
    /// Mute duration applied once the limit is exceeded, minutes.
    pub brush_speech_time_mins: u64,
    /// Number of mutes within the ban-counter lifetime that escalates to a
    /// full ban push instead of a plain mute-trigger push.
    pub brush_ban_limit: i64,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            brush_time_secs: 5,
            brush_limit: 5,
            brush_speech_time_mins: 5,
            brush_ban_limit: 3,
        }
    }
}

/// A record pushed to `im_brush_user_trigger_push_key` on a mute trigger.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TriggerUser {
    pub user_id: String,
    pub mute_minutes: u64,
}

/// A record pushed to `im_brush_user_block_push_key` once the ban
/// threshold is crossed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockUser {
    pub user_id: String,
}

fn mute_key(uid: &str) -> String {
    format!("im_super_brush_all_mute:{uid}")
}

fn counter_key(uid: &str) -> String {
    format!("im_brush_user:{uid}")
}

fn ban_counter_key(uid: &str) -> String {
    format!("brush_user_block_im:{uid}")
}

const TRIGGER_PUSH_KEY: &str = "im_brush_user_trigger_push_key";
const BLOCK_PUSH_KEY: &str = "im_brush_user_block_push_key";

/// Outcome of a `check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushOutcome {
    Allowed,
    /// Deny with the remaining mute TTL in seconds.
    Muted { ttl_secs: i64 },
}

/// Apply BrushLimit to one send from `uid`. Mirrors the §4.1.2 algorithm
/// exactly: check-then-increment-then-escalate, all against `store`.
pub async fn check(
    store: &dyn SharedStore,
    config: &BrushConfig,
    uid: &str,
) -> Result<BrushOutcome, crate::store::StoreError> {
    let existing_ttl = store.ttl_secs(&mute_key(uid)).await?;
    if existing_ttl > 0 {
        return Ok(BrushOutcome::Muted {
            ttl_secs: existing_ttl,
        });
    }

    let count = store.incr(&counter_key(uid)).await?;
    if count == 1 {
        store
            .expire(&counter_key(uid), Duration::from_secs(config.brush_time_secs))
            .await?;
    }

    if count > config.brush_limit {
        let mute_ttl = Duration::from_secs(config.brush_speech_time_mins * 60);
        store.set_ex(&mute_key(uid), "1", mute_ttl).await?;

        let ban_count = store.incr(&ban_counter_key(uid)).await?;
        if ban_count >= config.brush_ban_limit {
            let record = BlockUser {
                user_id: uid.to_string(),
            };
            store
                .list_push(BLOCK_PUSH_KEY, &serde_json::to_string(&record).unwrap())
                .await?;
            store.del(&ban_counter_key(uid)).await?;
        } else {
            let record = TriggerUser {
                user_id: uid.to_string(),
                mute_minutes: config.brush_speech_time_mins,
            };
            store
                .list_push(TRIGGER_PUSH_KEY, &serde_json::to_string(&record).unwrap())
                .await?;
        }
        store.del(&counter_key(uid)).await?;

        return Ok(BrushOutcome::Muted {
            ttl_secs: (config.brush_speech_time_mins * 60) as i64,
        });
    }

    Ok(BrushOutcome::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn test_config() -> BrushConfig {
        BrushConfig {
            brush_time_secs: 60,
            brush_limit: 2,
            brush_speech_time_mins: 1,
            brush_ban_limit: 2,
        }
    }

    #[tokio::test]
    async fn accepts_sends_within_limit() {
        let store = MemoryStore::new();
        let config = test_config();
        assert_eq!(check(&store, &config, "u1").await.unwrap(), BrushOutcome::Allowed);
        assert_eq!(check(&store, &config, "u1").await.unwrap(), BrushOutcome::Allowed);
    }

    #[tokio::test]
    async fn mutes_after_exceeding_limit() {
        let store = MemoryStore::new();
        let config = test_config();
        check(&store, &config, "u1").await.unwrap();
        check(&store, &config, "u1").await.unwrap();
        let outcome = check(&store, &config, "u1").await.unwrap();
        assert!(matches!(outcome, BrushOutcome::Muted { ttl_secs } if ttl_secs > 0));
    }

    #[tokio::test]
    async fn stays_muted_on_subsequent_calls() {
        let store = MemoryStore::new();
        let config = test_config();
        for _ in 0..3 {
            check(&store, &config, "u1").await.unwrap();
        }
        let outcome = check(&store, &config, "u1").await.unwrap();
        assert!(matches!(outcome, BrushOutcome::Muted { .. }));
    }

    #[tokio::test]
    async fn escalates_to_ban_push_after_repeated_mutes() {
        let store = MemoryStore::new();
        let config = test_config();
        // first mute trigger
        for _ in 0..3 {
            check(&store, &config, "u1").await.unwrap();
        }
        store.del("im_super_brush_all_mute:u1").await.unwrap();
        // second mute trigger crosses brush_ban_limit=2
        for _ in 0..3 {
            check(&store, &config, "u1").await.unwrap();
        }
        assert_eq!(store.list_snapshot(BLOCK_PUSH_KEY).len(), 1);
        assert_eq!(store.list_snapshot(TRIGGER_PUSH_KEY).len(), 1);
    }

    #[tokio::test]
    async fn different_users_are_independent() {
        let store = MemoryStore::new();
        let config = test_config();
        check(&store, &config, "u1").await.unwrap();
        check(&store, &config, "u1").await.unwrap();
        check(&store, &config, "u1").await.unwrap();
        assert_eq!(
            check(&store, &config, "u2").await.unwrap(),
            BrushOutcome::Allowed
        );
    }
}
