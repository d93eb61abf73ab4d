//! Minimal inbound send-request surface.
//!
//! A real deployment would front this with a proper chat-api gateway
//! (auth, rate limiting at the edge, multi-protocol ingest); this is the
//! smallest thing that turns a `SendRequest` into a `SendGuard::send` call
//! followed by a `MessageBus::publish`, so the validation layer and the
//! bus/fanout/merger pipeline it feeds are reachable from one process.

use crate::bus::MessageBus;
use crate::model::SendRequest;
use crate::sendguard::SendGuard;
use axum::extract::State;
use axum::{routing::post, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
struct IngressState {
    sendguard: Arc<SendGuard>,
    bus: Arc<dyn MessageBus>,
}

/// Serve `POST /send` on `port`, validating each request through
/// `sendguard` and publishing accepted, deliverable messages onto `bus`.
pub async fn serve(port: u16, sendguard: Arc<SendGuard>, bus: Arc<dyn MessageBus>) {
    let app = Router::new()
        .route("/send", post(handle_send))
        .with_state(IngressState { sendguard, bus });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "ingress http server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind ingress http server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "ingress http server error");
    }
}

async fn handle_send(
    State(state): State<IngressState>,
    Json(req): Json<SendRequest>,
) -> Json<serde_json::Value> {
    let rand_seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);

    match state.sendguard.send(req, rand_seed).await {
        Ok(accepted) => {
            if !accepted.suppress_delivery {
                let conversation_key = accepted.message.conversation_key();
                if let Err(err) = state.bus.publish(&conversation_key, accepted.message).await {
                    warn!(error = %err, "failed to publish accepted message to bus");
                }
            }
            Json(serde_json::json!({
                "server_msg_id": accepted.server_msg_id,
                "client_msg_id": accepted.client_msg_id,
                "send_time": accepted.send_time,
            }))
        }
        Err(err) => Json(serde_json::json!({
            "error": err.to_string(),
            "error_code": err.error_code(),
        })),
    }
}
