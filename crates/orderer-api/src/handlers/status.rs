//! /status, /config, /shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use orderer_core::config::OrdererConfig;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub height: u64,
    pub last_hash: String,
    pub messages_ordered: u64,
    pub halted: Option<String>,
    pub queued: usize,
    pub streams: usize,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let tip = state.broadcaster.tip();
    let settings = state.broadcaster.settings();

    Json(StatusResponse {
        height: tip.height,
        last_hash: tip.last_hash,
        messages_ordered: tip.messages_ordered,
        halted: tip.halted,
        queued: state.broadcaster.queued(),
        streams: state.broadcaster.streams().len(),
        batch_size: settings.batch_size,
        batch_timeout_ms: settings.batch_timeout.as_millis() as u64,
    })
}

// ── /config ──────────────────────────────────────────────────────────────────

pub async fn handle_config(State(state): State<ApiState>) -> Json<OrdererConfig> {
    Json(state.config.as_ref().clone())
}

// ── /shutdown ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    // No receivers just means everything is already stopping.
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
