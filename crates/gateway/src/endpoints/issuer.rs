//! # GET /api/stellar/issuer
//!
//! クライアント側でtrustlineを作成するために、発行者の公開アカウントIDを公開する。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tokenforge_crypto::Keypair;
use tokenforge_types::IssuerInfo;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// GET /api/stellar/issuer — 発行者アカウントIDとネットワークパスフレーズ。
pub async fn handle_issuer(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<IssuerInfo>, GatewayError> {
    let secret = state.credentials.issuer_secret().ok_or_else(|| {
        GatewayError::NotConfigured("issuer credential not configured".to_string())
    })?;
    let keypair = Keypair::from_secret(&secret).map_err(|_| {
        GatewayError::NotConfigured("issuer credential is not a valid secret seed".to_string())
    })?;

    Ok(Json(IssuerInfo {
        issuer: keypair.account_id(),
        network_passphrase: state.ledger.network_passphrase().to_string(),
    }))
}
