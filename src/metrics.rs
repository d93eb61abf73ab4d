//! Prometheus metrics collection for the dispatch/push pipeline, plus the
//! HTTP server that exposes them.
//!
//! Tracks send validation outcomes, fanout health, and offline-push
//! delivery, and serves `/metrics` (Prometheus scrape target) and
//! `/healthz` (which offline-push provider is wired up) on one port.

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::OnceLock;

static ACTIVE_PUSH_PROVIDER: OnceLock<&'static str> = OnceLock::new();

/// Record which `OfflinePusher` the process wired up, for `/healthz`.
pub fn set_active_push_provider(name: &'static str) {
    let _ = ACTIVE_PUSH_PROVIDER.set(name);
}

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // SendGuard
    // ========================================================================

    /// Messages accepted by SendGuard and handed to the bus.
    pub static ref MESSAGES_ACCEPTED: IntCounter = IntCounter::new(
        "impush_messages_accepted_total",
        "Messages accepted by SendGuard"
    ).unwrap();

    /// Messages rejected by SendGuard, labeled by error code.
    pub static ref MESSAGES_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("impush_messages_rejected_total", "Messages rejected by SendGuard"),
        &["error_code"]
    ).unwrap();

    /// BrushLimit rate-limit hits.
    pub static ref RATE_LIMITED: IntCounter = IntCounter::new(
        "impush_rate_limited_total",
        "Sends rejected by the brush rate limiter"
    ).unwrap();

    /// Sensitive-word hits (regardless of reject-vs-replace outcome).
    pub static ref SENSITIVE_WORD_HITS: IntCounter = IntCounter::new(
        "impush_sensitive_word_hits_total",
        "Messages containing a sensitive-word hit"
    ).unwrap();

    // ========================================================================
    // PushConsumer / Fanout
    // ========================================================================

    /// Messages dropped by the consumer for staleness.
    pub static ref MESSAGES_DROPPED_STALE: IntCounter = IntCounter::new(
        "impush_messages_dropped_stale_total",
        "Messages dropped by the consumer for exceeding the staleness window"
    ).unwrap();

    /// Fanout buckets whose gateway RPC failed and were swallowed.
    pub static ref FANOUT_BUCKET_ERRORS: IntCounter = IntCounter::new(
        "impush_fanout_bucket_errors_total",
        "Fanout gateway-RPC buckets that errored"
    ).unwrap();

    // ========================================================================
    // OfflinePusher
    // ========================================================================

    /// Offline-push attempts, labeled by provider.
    pub static ref OFFLINE_PUSH_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("impush_offline_push_attempts_total", "Offline-push attempts by provider"),
        &["provider"]
    ).unwrap();

    /// Offline-push failures, labeled by provider.
    pub static ref OFFLINE_PUSH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("impush_offline_push_failures_total", "Offline-push failures by provider"),
        &["provider"]
    ).unwrap();
}

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    REGISTRY.register(Box::new(MESSAGES_ACCEPTED.clone())).unwrap();
    REGISTRY.register(Box::new(MESSAGES_REJECTED.clone())).unwrap();
    REGISTRY.register(Box::new(RATE_LIMITED.clone())).unwrap();
    REGISTRY.register(Box::new(SENSITIVE_WORD_HITS.clone())).unwrap();
    REGISTRY.register(Box::new(MESSAGES_DROPPED_STALE.clone())).unwrap();
    REGISTRY.register(Box::new(FANOUT_BUCKET_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(OFFLINE_PUSH_ATTEMPTS.clone())).unwrap();
    REGISTRY.register(Box::new(OFFLINE_PUSH_FAILURES.clone())).unwrap();
}

/// Gather all metrics and encode them in Prometheus text format.
///
/// Returns a string suitable for HTTP response on `/metrics` endpoint.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

async fn metrics_handler() -> String {
    gather_metrics()
}

async fn healthz_handler() -> String {
    format!(
        "ok offline_push_provider={}\n",
        ACTIVE_PUSH_PROVIDER.get().copied().unwrap_or("unset")
    )
}

/// Serve `/metrics` and `/healthz` on `port`. Long-running; spawn it.
pub async fn serve(port: u16) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "metrics/health http server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind metrics http server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "metrics http server error");
    }
}
