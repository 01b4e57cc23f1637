//! # GET /api/stellar/debug-env
//!
//! 設定状況の確認用。秘密値や環境変数の一覧は返さない。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tokenforge_types::DebugEnvResponse;

use crate::config::GatewayState;

/// GET /api/stellar/debug-env — 発行者シードの有無と主要な設定値を返す。
pub async fn handle_debug_env(State(state): State<Arc<GatewayState>>) -> Json<DebugEnvResponse> {
    let secret_state = if state.credentials.issuer_secret().is_some() {
        "*** (exists)"
    } else {
        "Not found"
    };
    Json(DebugEnvResponse {
        stellar_secret_key: secret_state.to_string(),
        ping_message: state
            .ping_message
            .clone()
            .unwrap_or_else(|| "Not found".to_string()),
        app_env: state.app_env.clone(),
        horizon_url: state.ledger_url.clone(),
    })
}
