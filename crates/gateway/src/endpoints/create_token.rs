//! # POST /api/stellar/create-token
//!
//! トークン発行。`destinationAccount` 未指定時は発行内容の説明のみ返す。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tokenforge_core::{IssuanceRequest, IssuanceWorkflow};
use tokenforge_types::{CreateTokenRequest, CreateTokenResponse};
use tracing::Instrument;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /api/stellar/create-token — 発行ワークフローを1回実行する。
///
/// ボディがJSONとして解釈できない場合も失敗形式（400）で返す。
/// ワークフローの失敗はステータスコードと結果コードをそのまま返却する。
pub async fn handle_create_token(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<Json<CreateTokenResponse>, GatewayError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "リクエストボディを解釈できません");
        GatewayError::BadRequest(rejection.body_text())
    })?;
    let request = IssuanceRequest::from(body);

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("create_token", %request_id, token_code = %request.token_code);

    let workflow = IssuanceWorkflow::new(
        state.ledger.as_ref(),
        state.credentials.as_ref(),
        state.settings.clone(),
    );
    let result = workflow.issue(request).instrument(span).await;

    let status = result.status_code();
    result
        .into_response_body()
        .map(Json)
        .map_err(|body| GatewayError::Issuance { status, body })
}
