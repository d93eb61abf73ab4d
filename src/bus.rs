//! MessageBus contract and the PushConsumer that drains it.
//!
//! The bus itself (a partitioned, at-least-once append log) is an external
//! collaborator — production wiring would back `MessageBus` with a real
//! broker client. This module specifies the trait plus the consumer loop
//! that turns bus records into `Fanout` work.

use crate::fanout::Fanout;
use crate::merger::OnlineResultMerger;
use crate::model::{parse_at_text_targets, ContentType, Message, SessionType};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// A partitioned append log. `publish` appends `msg` keyed by
/// `conversation_key`; ordering is guaranteed within a key, undefined
/// across keys.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, conversation_key: &str, msg: Message) -> anyhow::Result<()>;
}

/// In-memory bus: an mpsc channel per process, used by tests and the
/// single-process wiring path. Ordering within a key is preserved because
/// there's exactly one underlying channel.
pub struct InProcessBus {
    tx: mpsc::UnboundedSender<Message>,
}

impl InProcessBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish(&self, _conversation_key: &str, msg: Message) -> anyhow::Result<()> {
        self.tx.send(msg).map_err(|e| anyhow::anyhow!("bus closed: {e}"))
    }
}

/// Drops messages older than this before dispatching to fanout, to prevent
/// catch-up storms after consumer downtime.
pub const STALENESS_THRESHOLD_MS: i64 = 30_000;

/// Pulls records and hands each to `Fanout` on a bounded worker pool. The
/// reader never blocks on fanout completion: it spawns the work and
/// immediately goes back to reading, trading strict at-least-once delivery
/// for reader liveness — documented and testable (§4.3 item 4).
pub struct PushConsumer {
    fanout: Arc<Fanout>,
    merger: Arc<OnlineResultMerger>,
    worker_cap: Arc<Semaphore>,
}

impl PushConsumer {
    pub fn new(fanout: Arc<Fanout>, merger: Arc<OnlineResultMerger>, worker_pool_size: usize) -> Self {
        Self {
            fanout,
            merger,
            worker_cap: Arc::new(Semaphore::new(worker_pool_size.max(1))),
        }
    }

    /// Run the consume loop against `rx` until the channel closes.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<Message>, now_ms: impl Fn() -> i64) {
        while let Some(msg) = rx.recv().await {
            if !Self::is_fresh(&msg, now_ms()) {
                crate::metrics::MESSAGES_DROPPED_STALE.inc();
                debug!(server_msg_id = %msg.server_msg_id, "dropping stale message");
                continue;
            }

            let recipients = Self::recipients_for(&msg);
            let fanout = Arc::clone(&self.fanout);
            let merger = Arc::clone(&self.merger);
            let permit = Arc::clone(&self.worker_cap);

            tokio::spawn(async move {
                let _permit = permit.acquire_owned().await;
                let (targets, ws_results) = match fanout.dispatch(&msg, recipients).await {
                    Ok(dispatched) => dispatched,
                    Err(err) => {
                        warn!(error = %err, "fanout dispatch failed");
                        return;
                    }
                };

                let conversation_id = msg.conversation_key();
                let (at_user_ids, at_all) = if msg.content_type == ContentType::AT_TEXT {
                    parse_at_text_targets(&msg.content)
                } else {
                    (Vec::new(), false)
                };

                if let Err(err) = merger
                    .merge(&msg, &targets, &ws_results, true, &conversation_id, &at_user_ids, at_all)
                    .await
                {
                    warn!(error = %err, "offline push merge failed");
                }
            });
        }
    }

    /// Property 7: drop if `now - sendTime > 30_000 ms`.
    pub fn is_fresh(msg: &Message, now_ms: i64) -> bool {
        now_ms - msg.send_time <= STALENESS_THRESHOLD_MS
    }

    /// Single-chat recipients = `[recvID]`, plus `sendID` when
    /// `isSenderSync` is set and differs from `recvID`; group-chat passes
    /// an empty list for `Fanout` to expand via the member-ID cache.
    fn recipients_for(msg: &Message) -> Vec<String> {
        match msg.session_type {
            SessionType::Group => Vec::new(),
            SessionType::Single | SessionType::Notification => {
                let mut recipients = vec![msg.recv_id.clone()];
                if msg.options.contains(crate::model::OptionFlags::IS_SENDER_SYNC)
                    && msg.send_id != msg.recv_id
                {
                    recipients.push(msg.send_id.clone());
                }
                recipients
            }
        }
    }

    /// Whether a conversation id should receive a best-effort
    /// `latestMsgSendTime` update (§4.3 item 5).
    pub fn wants_latest_send_time_update(conversation_id: &str) -> bool {
        conversation_id.starts_with("sg_") || conversation_id.starts_with("si_")
    }
}
