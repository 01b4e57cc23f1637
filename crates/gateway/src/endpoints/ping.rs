//! # GET /api/ping

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tokenforge_types::PingResponse;

use crate::config::{GatewayState, DEFAULT_PING_MESSAGE};

/// GET /api/ping — 死活確認。
pub async fn handle_ping(State(state): State<Arc<GatewayState>>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state
            .ping_message
            .clone()
            .unwrap_or_else(|| DEFAULT_PING_MESSAGE.to_string()),
    })
}
