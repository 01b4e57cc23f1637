//! # Tokenforge Gateway
//!
//! Stellar 上のカスタムアセット発行を公開するHTTP API。
//!
//! ## API エンドポイント
//! - `POST /api/stellar/create-token` — アセットの発行（配布先未指定時は説明のみ）
//! - `GET /api/stellar/issuer` — 発行者アカウントIDの公開
//! - `GET /api/stellar/debug-env` — 設定状況の確認（秘密値は返さない）
//! - `GET /api/ping` — 死活確認

mod config;
mod endpoints;
mod error;
mod horizon;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokenforge_core::issuance::{
    CredentialSource, EnvCredential, IssuanceSettings, ISSUER_SECRET_ENV,
};
use tokenforge_core::ledger::mock::MockLedger;
use tokenforge_core::transaction::{BASE_FEE, DEFAULT_TIMEOUT_SECS};
use tokenforge_core::LedgerClient;
use tokenforge_crypto::{Keypair, TESTNET_PASSPHRASE};

use config::GatewayState;
use endpoints::*;
use horizon::HorizonClient;

/// デフォルトの接続先（testnet）
const DEFAULT_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

/// モック起動時に作成するアカウントの初期シーケンス番号
const MOCK_INITIAL_SEQUENCE: i64 = 1;

/// ルーターを構築する。
fn build_router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/api/ping", axum::routing::get(handle_ping))
        .route(
            "/api/stellar/create-token",
            axum::routing::post(handle_create_token),
        )
        .route("/api/stellar/issuer", axum::routing::get(handle_issuer))
        .route("/api/stellar/debug-env", axum::routing::get(handle_debug_env))
        .with_state(state)
}

/// 数値の環境変数を読み込む。未設定ならデフォルト値を使用する。
fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} の値が不正です ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

/// 発行設定を環境変数から読み込む。有効期間が `1..=MAX_TIMEOUT_SECS` でなければ起動しない。
fn load_settings() -> anyhow::Result<IssuanceSettings> {
    let settings = IssuanceSettings {
        base_fee: env_parse("STELLAR_BASE_FEE", BASE_FEE)?,
        timeout_secs: env_parse("TX_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
    };
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("TX_TIMEOUT_SECS の値が不正です: {e}"))?;
    Ok(settings)
}

/// モックレジャーを構築する。
///
/// 発行者と `MOCK_ACCOUNTS`（カンマ区切りのアカウントID）を事前に作成する。
fn build_mock_ledger(passphrase: &str, credentials: &dyn CredentialSource) -> MockLedger {
    let ledger = MockLedger::new(passphrase);

    if let Some(issuer) = credentials
        .issuer_secret()
        .and_then(|secret| Keypair::from_secret(&secret).ok())
    {
        ledger.create_account(&issuer.account_id(), MOCK_INITIAL_SEQUENCE);
        tracing::info!(issuer = %issuer.account_id(), "モックレジャーに発行者アカウントを作成しました");
    }

    let accounts = std::env::var("MOCK_ACCOUNTS").unwrap_or_default();
    for account_id in accounts.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        ledger.create_account(account_id, MOCK_INITIAL_SEQUENCE);
        tracing::info!(account = %account_id, "モックレジャーにアカウントを作成しました");
    }

    ledger
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // 環境変数の読み込み
    let horizon_url =
        std::env::var("HORIZON_URL").unwrap_or_else(|_| DEFAULT_HORIZON_URL.to_string());
    let network_passphrase = std::env::var("STELLAR_NETWORK_PASSPHRASE")
        .unwrap_or_else(|_| TESTNET_PASSPHRASE.to_string());
    let settings = load_settings()?;
    let http_timeout = Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 60u64)?);
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let ping_message = std::env::var("PING_MESSAGE").ok();
    let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    // 発行者シードはリクエストごとに読み込む。起動時は有無のみ記録する
    let credentials = EnvCredential::default();
    if credentials.issuer_secret().is_none() {
        tracing::warn!("{}が未設定です。発行リクエストは失敗します", ISSUER_SECRET_ENV);
    }

    // レジャー選択: MOCK_MODE=true ならモック、それ以外はHorizon
    let (ledger, ledger_url): (Box<dyn LedgerClient>, String) =
        if std::env::var("MOCK_MODE").unwrap_or_default() == "true" {
            tracing::info!("MockLedgerで起動します");
            (
                Box::new(build_mock_ledger(&network_passphrase, &credentials)),
                "mock".to_string(),
            )
        } else {
            tracing::info!(horizon_url = %horizon_url, "Horizonに接続します");
            (
                Box::new(HorizonClient::new(&horizon_url, &network_passphrase, http_timeout)?),
                horizon_url,
            )
        };

    let state = Arc::new(GatewayState {
        ledger,
        credentials: Box::new(credentials),
        settings,
        ping_message,
        app_env,
        ledger_url,
    });

    let app = build_router(state);

    tracing::info!("Gatewayを {} で起動します", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
