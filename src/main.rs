//! impush-ng - message dispatch and offline-push pipeline.
//!
//! Boots the SendGuard validation layer, a minimal `/send` ingress surface,
//! the Fanout/gateway-discovery scheduler, the online/offline result
//! merger, and the bus consumer that ties them together. A real deployment
//! would front the ingress with a proper chat-api gateway; this process
//! owns everything from request validation onward.

mod bus;
mod config;
mod error;
mod fanout;
mod ingress;
mod localcache;
mod merger;
mod metrics;
mod model;
mod push;
mod sendguard;
mod store;

use crate::config::Config;
use crate::fanout::discovery::NullDiscovery;
use crate::fanout::{Fanout, IdentityPreSendOnlineHook, NoopGroupLifecycleHook};
use crate::localcache::{GroupMemberIdCache, StubGroupMembersSource};
use crate::merger::{AlwaysWantsOfflinePush, OnlineResultMerger};
use crate::push::dummy::DummyPusher;
use crate::push::fcm::{FcmPusher, FcmTokenSource};
use crate::push::getui::GetuiPusher;
use crate::push::jpush::JPushPusher;
use crate::push::OfflinePusher;
use crate::sendguard::brushlimit::BrushConfig;
use crate::sendguard::collaborators::{StubGroupDirectory, StubReceiveModePolicy, StubUserRelations};
use crate::sendguard::SendGuard;
use crate::store::{MemoryStore, SharedStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `impush.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {flag}");
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "impush.toml".to_string(),
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// There is no separate `push.enabled` toggle in config: `PushProvider::Dummy`
/// (a no-op provider) doubles as "offline push disabled".
fn build_pusher(config: &config::PushConfig, store: Arc<dyn SharedStore>) -> Arc<dyn OfflinePusher> {
    match config.enable {
        config::PushProvider::Dummy => Arc::new(DummyPusher),
        config::PushProvider::Fcm => {
            struct NoTokens;
            #[async_trait::async_trait]
            impl FcmTokenSource for NoTokens {
                async fn get_fcm_token(&self, _user_id: &str) -> Option<String> {
                    None
                }
            }
            Arc::new(FcmPusher::new(config.fcm.credentials_path.clone(), Arc::new(NoTokens)))
        }
        config::PushProvider::JPush => Arc::new(JPushPusher::new(
            config.jpush.app_key.clone(),
            config.jpush.master_secret.clone(),
        )),
        config::PushProvider::Getui => Arc::new(GetuiPusher::new(
            config.getui.base_url.clone(),
            config.getui.app_key.clone(),
            config.getui.master_secret.clone(),
            config.getui.channel_id.clone(),
            config.getui.channel_name.clone(),
            store,
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {config_path}: {e}");
        e
    })?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).init();

    if let Err(errors) = crate::config::validate(&config) {
        for err in &errors {
            error!(error = %err, "configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(server = %config.server.name, "starting impush-ng");

    if config.server.metrics_port == 0 {
        info!("metrics disabled");
    } else {
        metrics::init();
        let metrics_port = config.server.metrics_port;
        tokio::spawn(async move {
            metrics::serve(metrics_port).await;
        });
        info!(port = metrics_port, "metrics/health http server started");
    }

    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());

    // Validation-path wiring. Production deployments back these with RPCs to
    // the user/group/conversation services; until that's configured, sends
    // are accepted permissively by the in-memory stand-ins.
    let sendguard = Arc::new(SendGuard::new(
        Arc::new(StubUserRelations::default()),
        Arc::new(StubReceiveModePolicy::default()),
        Arc::new(StubGroupDirectory::default()),
        Arc::clone(&store),
        config.manager.clone(),
        config.message_verify.clone(),
        BrushConfig::default(),
    ));

    // Push-path wiring: bus -> fanout -> merger -> offline pusher.
    let (message_bus, rx) = bus::InProcessBus::new();
    let message_bus: Arc<dyn bus::MessageBus> = Arc::new(message_bus);

    let discovery = Arc::new(NullDiscovery::default());
    let member_cache = Arc::new(GroupMemberIdCache::new(Arc::new(StubGroupMembersSource::default())));
    let fanout = Arc::new(Fanout::new(
        &config.discovery,
        discovery,
        member_cache,
        Arc::new(IdentityPreSendOnlineHook),
        Arc::new(NoopGroupLifecycleHook),
    ));

    let pusher = build_pusher(&config.push, Arc::clone(&store));
    info!(provider = pusher.name(), "offline push provider wired");
    metrics::set_active_push_provider(pusher.name());
    let merger = Arc::new(OnlineResultMerger::new(Arc::new(AlwaysWantsOfflinePush), pusher));

    let consumer = Arc::new(bus::PushConsumer::new(fanout, merger, config.bus.worker_pool_size));
    tokio::spawn(async move {
        consumer.run(rx, now_ms).await;
    });

    let ingress_port = config.server.ingress_port;
    let ingress_sendguard = Arc::clone(&sendguard);
    let ingress_bus = Arc::clone(&message_bus);
    tokio::spawn(async move {
        ingress::serve(ingress_port, ingress_sendguard, ingress_bus).await;
    });
    info!(port = ingress_port, "ingress http server started");

    info!("push consumer running, awaiting shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting");

    Ok(())
}
