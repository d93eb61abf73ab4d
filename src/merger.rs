//! OnlineResultMerger + OfflineDecision: turns a fanout's gateway results
//! into an online/offline split and drives the configured `OfflinePusher`.

use crate::error::PushError;
use crate::model::{ContentType, Message, PlatformResult, SessionType, SinglePushResult, PLATFORM_MOBILE, PLATFORM_PC, PLATFORM_WEB};
use crate::push::{build_offline_push_ex, should_skip_offline_push, title_and_body_for, OfflinePusher};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Conversation-service seam: which of a candidate set actually wants
/// offline push for this specific conversation.
#[async_trait]
pub trait ConversationOfflinePushPolicy: Send + Sync {
    async fn wants_offline_push(&self, conversation_id: &str, candidates: &[String]) -> Vec<String>;
}

/// Permissive default: everyone not opted out is assumed to want it. A
/// stricter policy (reading per-conversation receive-mode) plugs in here.
pub struct AlwaysWantsOfflinePush;

#[async_trait]
impl ConversationOfflinePushPolicy for AlwaysWantsOfflinePush {
    async fn wants_offline_push(&self, _conversation_id: &str, candidates: &[String]) -> Vec<String> {
        candidates.to_vec()
    }
}

/// Result of merging a fanout's gateway responses, kept for observability
/// and tests even though the caller usually only needs the side effect.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub online_success: Vec<String>,
    pub offline_pushed: Vec<String>,
    pub web_pc_nudge_targets: Vec<String>,
}

fn is_mobile_online(result: &SinglePushResult) -> bool {
    result.online_push
        && result
            .per_platform
            .first()
            .is_some_and(|p| p.platform_id == PLATFORM_MOBILE)
}

/// Group `recipients` by the `(title, body)` `title_and_body_for` computes
/// for each of them, preserving first-seen group order. An `AtText` message
/// with some recipients `@`-mentioned and others not yields more than one
/// group; every other content type collapses to a single group.
fn group_by_title_body(
    msg: &Message,
    recipients: &[String],
    at_user_ids: &[String],
    at_all: bool,
) -> Vec<(String, String, Vec<String>)> {
    let mut groups: Vec<(String, String, Vec<String>)> = Vec::new();
    for recipient in recipients {
        let (title, body) = title_and_body_for(msg, recipient, at_user_ids, at_all);
        match groups.iter_mut().find(|(t, b, _)| *t == title && *b == body) {
            Some((_, _, ids)) => ids.push(recipient.clone()),
            None => groups.push((title, body, vec![recipient.clone()])),
        }
    }
    groups
}

fn is_web_pc_background(result: &SinglePushResult) -> bool {
    !result.online_push
        && result.per_platform.iter().any(|p: &PlatformResult| {
            p.result_code == -2 && (p.platform_id == PLATFORM_PC || p.platform_id == PLATFORM_WEB)
        })
}

pub struct OnlineResultMerger {
    offline_push_policy: Arc<dyn ConversationOfflinePushPolicy>,
    pusher: Arc<dyn OfflinePusher>,
}

impl OnlineResultMerger {
    pub fn new(offline_push_policy: Arc<dyn ConversationOfflinePushPolicy>, pusher: Arc<dyn OfflinePusher>) -> Self {
        Self {
            offline_push_policy,
            pusher,
        }
    }

    /// Entry point. `push_to_user_ids` is the fanout's original target list
    /// (pre-gateway-response); `ws_results` is what the gateways answered
    /// with. `push_enabled` is the effective offline-push feature flag.
    pub async fn merge(
        &self,
        msg: &Message,
        push_to_user_ids: &[String],
        ws_results: &[SinglePushResult],
        push_enabled: bool,
        conversation_id: &str,
        at_user_ids: &[String],
        at_all: bool,
    ) -> Result<MergeOutcome, PushError> {
        match msg.session_type {
            SessionType::Single | SessionType::Notification => {
                self.merge_single(msg, ws_results, push_enabled, conversation_id, at_user_ids, at_all)
                    .await
            }
            SessionType::Group => {
                self.merge_group(msg, push_to_user_ids, ws_results, push_enabled, conversation_id, at_user_ids, at_all)
                    .await
            }
        }
    }

    fn offline_gate_closed(&self, msg: &Message, push_enabled: bool) -> bool {
        if !push_enabled {
            return true;
        }
        if msg.session_type == SessionType::Group && msg.content_type == ContentType::SIGNALING_NOTIFICATION {
            return true;
        }
        should_skip_offline_push(msg.content_type, &msg.content)
    }

    async fn merge_single(
        &self,
        msg: &Message,
        ws_results: &[SinglePushResult],
        push_enabled: bool,
        conversation_id: &str,
        at_user_ids: &[String],
        at_all: bool,
    ) -> Result<MergeOutcome, PushError> {
        let online_success: Vec<String> = ws_results
            .iter()
            .filter(|r| is_mobile_online(r))
            .map(|r| r.user_id.clone())
            .collect();
        let online_set: HashSet<&str> = online_success.iter().map(String::as_str).collect();

        let offline_candidates: Vec<String> = ws_results
            .iter()
            .filter(|r| !online_set.contains(r.user_id.as_str()) && r.user_id != msg.send_id && !r.user_id.is_empty())
            .map(|r| r.user_id.clone())
            .collect();

        let mut outcome = MergeOutcome {
            online_success,
            ..Default::default()
        };

        if self.offline_gate_closed(msg, push_enabled) || offline_candidates.is_empty() {
            return Ok(outcome);
        }

        let ex = build_offline_push_ex(msg, conversation_id);
        let opts = crate::model::OfflinePushOpts {
            signal: false,
            ios_badge_count: msg.offline_push_info.as_ref().and_then(|i| i.ios_badge_count),
            ios_push_sound: msg.offline_push_info.as_ref().and_then(|i| i.ios_push_sound.clone()),
            ex,
        };

        for (title, body, ids) in group_by_title_body(msg, &offline_candidates, at_user_ids, at_all) {
            self.record_attempt_and_push(&outcome.online_success, &ids, &title, &body, &opts)
                .await?;
        }
        outcome.offline_pushed = offline_candidates;

        Ok(outcome)
    }

    async fn record_attempt_and_push(
        &self,
        online_ids: &[String],
        offline_ids: &[String],
        title: &str,
        body: &str,
        opts: &crate::model::OfflinePushOpts,
    ) -> Result<(), PushError> {
        crate::metrics::OFFLINE_PUSH_ATTEMPTS
            .with_label_values(&[self.pusher.name()])
            .inc();
        let result = self.pusher.push(online_ids, offline_ids, title, body, opts).await;
        if result.is_err() {
            crate::metrics::OFFLINE_PUSH_FAILURES
                .with_label_values(&[self.pusher.name()])
                .inc();
        }
        result
    }

    async fn merge_group(
        &self,
        msg: &Message,
        push_to_user_ids: &[String],
        ws_results: &[SinglePushResult],
        push_enabled: bool,
        conversation_id: &str,
        at_user_ids: &[String],
        at_all: bool,
    ) -> Result<MergeOutcome, PushError> {
        let mut online_success: HashSet<String> = ws_results
            .iter()
            .filter(|r| r.online_push && r.user_id != msg.send_id)
            .map(|r| r.user_id.clone())
            .collect();
        online_success.insert(msg.send_id.clone());

        let web_pc_background: HashSet<String> = ws_results
            .iter()
            .filter(|r| is_web_pc_background(r))
            .map(|r| r.user_id.clone())
            .collect();

        // Corrected set difference: pushToUserIDs minus onlineSuccess, not
        // the reverse. See the regression test below.
        let need_offline: Vec<String> = push_to_user_ids
            .iter()
            .filter(|id| !online_success.contains(id.as_str()))
            .cloned()
            .collect();

        let mut outcome = MergeOutcome {
            online_success: online_success.iter().cloned().collect(),
            ..Default::default()
        };

        if self.offline_gate_closed(msg, push_enabled) || need_offline.is_empty() {
            return Ok(outcome);
        }

        let wanting_offline = self
            .offline_push_policy
            .wants_offline_push(conversation_id, &need_offline)
            .await;

        if !wanting_offline.is_empty() {
            let ex = build_offline_push_ex(msg, conversation_id);
            let opts = crate::model::OfflinePushOpts {
                signal: false,
                ios_badge_count: msg.offline_push_info.as_ref().and_then(|i| i.ios_badge_count),
                ios_push_sound: msg.offline_push_info.as_ref().and_then(|i| i.ios_push_sound.clone()),
                ex,
            };

            let online_success_vec: Vec<String> = outcome.online_success.clone();
            for (title, body, ids) in group_by_title_body(msg, &wanting_offline, at_user_ids, at_all) {
                self.record_attempt_and_push(&online_success_vec, &ids, &title, &body, &opts)
                    .await?;
            }
            outcome.offline_pushed = wanting_offline.clone();
        }

        outcome.web_pc_nudge_targets = wanting_offline
            .iter()
            .filter(|id| web_pc_background.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OptionFlags, SessionType};
    use std::sync::Mutex;

    struct RecordingPusher {
        calls: Mutex<Vec<(Vec<String>, Vec<String>)>>,
    }

    impl RecordingPusher {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl OfflinePusher for RecordingPusher {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn push(
            &self,
            online_ids: &[String],
            offline_ids: &[String],
            _title: &str,
            _body: &str,
            _opts: &crate::model::OfflinePushOpts,
        ) -> Result<(), PushError> {
            self.calls.lock().unwrap().push((online_ids.to_vec(), offline_ids.to_vec()));
            Ok(())
        }
    }

    fn group_msg(content_type: ContentType) -> Message {
        Message {
            server_msg_id: "m1".into(),
            client_msg_id: "c1".into(),
            seq: 0,
            send_id: "a".into(),
            recv_id: String::new(),
            group_id: Some("g1".into()),
            session_type: SessionType::Group,
            content_type,
            content: Vec::new(),
            send_time: 1,
            sender_platform_id: 1,
            options: OptionFlags::default(),
            offline_push_info: None,
            ex: None,
        }
    }

    fn platform_result(user_id: &str, online: bool, platform_id: i32, result_code: i32) -> SinglePushResult {
        SinglePushResult {
            user_id: user_id.to_string(),
            online_push: online,
            per_platform: vec![PlatformResult { platform_id, result_code }],
        }
    }

    #[tokio::test]
    async fn group_offline_targets_uses_corrected_set_difference() {
        let pusher = Arc::new(RecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), Arc::clone(&pusher) as Arc<dyn OfflinePusher>);

        let msg = group_msg(ContentType::TEXT);
        let push_to = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let results = vec![
            platform_result("b", true, PLATFORM_MOBILE, 0),
            platform_result("c", true, PLATFORM_MOBILE, 0),
            platform_result("d", false, PLATFORM_WEB, -2),
        ];

        let outcome = merger
            .merge(&msg, &push_to, &results, true, "group:g1", &[], false)
            .await
            .unwrap();

        // Corrected semantics: needOffline = pushTo \ onlineSuccess = {d}.
        // The buggy original (onlineSuccess \ pushTo) would compute {} here.
        assert_eq!(outcome.offline_pushed, vec!["d".to_string()]);
        assert_eq!(outcome.web_pc_nudge_targets, vec!["d".to_string()]);

        let calls = pusher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["d".to_string()]);
    }

    #[tokio::test]
    async fn group_sender_always_counted_online_success() {
        let pusher = Arc::new(RecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), pusher);

        let msg = group_msg(ContentType::TEXT);
        let push_to = vec!["a".to_string()];

        let outcome = merger.merge(&msg, &push_to, &[], true, "group:g1", &[], false).await.unwrap();
        assert!(outcome.online_success.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn single_chat_excludes_sender_from_offline_targets() {
        let pusher = Arc::new(RecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), Arc::clone(&pusher) as Arc<dyn OfflinePusher>);

        let mut msg = group_msg(ContentType::TEXT);
        msg.session_type = SessionType::Single;
        msg.send_id = "a".into();
        msg.recv_id = "b".into();

        let results = vec![platform_result("b", false, PLATFORM_MOBILE, 0)];
        let outcome = merger
            .merge(&msg, &["b".to_string()], &results, true, "single:a:b", &[], false)
            .await
            .unwrap();

        assert_eq!(outcome.offline_pushed, vec!["b".to_string()]);
        assert!(!outcome.offline_pushed.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn signaling_notification_skips_offline_branch_in_group() {
        let pusher = Arc::new(RecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), Arc::clone(&pusher) as Arc<dyn OfflinePusher>);

        let msg = group_msg(ContentType::SIGNALING_NOTIFICATION);
        let push_to = vec!["a".to_string(), "b".to_string()];

        let outcome = merger.merge(&msg, &push_to, &[], true, "group:g1", &[], false).await.unwrap();
        assert!(outcome.offline_pushed.is_empty());
        assert!(pusher.calls.lock().unwrap().is_empty());
    }

    struct TitleRecordingPusher {
        calls: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl TitleRecordingPusher {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl OfflinePusher for TitleRecordingPusher {
        fn name(&self) -> &'static str {
            "title-recording"
        }

        async fn push(
            &self,
            _online_ids: &[String],
            offline_ids: &[String],
            title: &str,
            body: &str,
            _opts: &crate::model::OfflinePushOpts,
        ) -> Result<(), PushError> {
            self.calls.lock().unwrap().push((title.to_string(), body.to_string(), offline_ids.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn group_at_text_splits_offline_push_by_per_recipient_title() {
        let pusher = Arc::new(TitleRecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), Arc::clone(&pusher) as Arc<dyn OfflinePusher>);

        let msg = group_msg(ContentType::AT_TEXT);
        let push_to = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let at_user_ids = vec!["b".to_string()];

        let outcome = merger
            .merge(&msg, &push_to, &[], true, "group:g1", &at_user_ids, false)
            .await
            .unwrap();

        // b is @-mentioned; c is not. Both are offline and must be pushed
        // with their own title, not whichever title the first offline id
        // happens to carry.
        assert_eq!(outcome.offline_pushed.len(), 2);

        let calls = pusher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let mentioned_call = calls.iter().find(|(_, _, ids)| ids == &vec!["b".to_string()]).unwrap();
        assert_eq!(mentioned_call.0, "[someone @you]");
        let unmentioned_call = calls.iter().find(|(_, _, ids)| ids == &vec!["c".to_string()]).unwrap();
        assert_eq!(unmentioned_call.0, "[Group message]");
    }

    #[tokio::test]
    async fn push_disabled_flag_closes_gate_for_single_chat() {
        let pusher = Arc::new(RecordingPusher::new());
        let merger = OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), Arc::clone(&pusher) as Arc<dyn OfflinePusher>);

        let mut msg = group_msg(ContentType::TEXT);
        msg.session_type = SessionType::Single;
        msg.send_id = "a".into();
        msg.recv_id = "b".into();

        let results = vec![platform_result("b", false, PLATFORM_MOBILE, 0)];
        let outcome = merger
            .merge(&msg, &["b".to_string()], &results, false, "single:a:b", &[], false)
            .await
            .unwrap();

        assert!(outcome.offline_pushed.is_empty());
    }
}
