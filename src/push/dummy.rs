//! No-op pusher for disabled/test deployments.

use crate::error::PushError;
use crate::model::OfflinePushOpts;
use crate::push::OfflinePusher;
use async_trait::async_trait;
use tracing::debug;

pub struct DummyPusher;

#[async_trait]
impl OfflinePusher for DummyPusher {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn push(
        &self,
        online_ids: &[String],
        offline_ids: &[String],
        title: &str,
        _body: &str,
        _opts: &OfflinePushOpts,
    ) -> Result<(), PushError> {
        debug!(
            online = online_ids.len(),
            offline = offline_ids.len(),
            title = %title,
            "dummy offline push"
        );
        Ok(())
    }
}
