//! # Tokenforge CLI
//!
//! - `keygen` — Stellar キーペアの生成
//! - `describe` — 発行予定アセットの表示（ローカル、ネットワーク通信なし）
//! - `issue` — Gateway 経由でのアセット発行
//! - `issuer` / `ping` — Gateway の状態確認

mod client;

use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokenforge_core::issuance::{
    EnvCredential, IssuanceRequest, IssuanceSettings, IssuanceWorkflow, ISSUER_SECRET_ENV,
};
use tokenforge_core::ledger::mock::MockLedger;
use tokenforge_crypto::{Keypair, TESTNET_PASSPHRASE};
use tokenforge_types::{AmountField, CreateTokenRequest};

use client::{ClientError, GatewayClient};

#[derive(Debug, Parser)]
#[command(name = "tokenforge", version, about = "Stellar asset issuance CLI")]
struct Cli {
    /// Gateway のベースURL
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    gateway: String,

    /// HTTPタイムアウト（秒）
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 新しいキーペアを生成する
    Keygen,
    /// 発行予定のアセットを表示する（発行者シードは環境変数から読み込む）
    Describe {
        /// アセットコード
        #[arg(long)]
        code: String,
    },
    /// Gateway 経由でアセットを発行する
    Issue {
        /// アセットコード
        #[arg(long)]
        code: String,
        /// 発行量
        #[arg(long, default_value = tokenforge_types::DEFAULT_ISSUE_AMOUNT)]
        amount: String,
        /// 配布先アカウントID
        #[arg(long)]
        destination: String,
        /// 配布先シードを読み込む環境変数名（trustline作成時の二重署名用）
        #[arg(long)]
        destination_secret_env: Option<String>,
    },
    /// 発行者アカウントIDを表示する
    Issuer,
    /// Gateway の死活確認
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = || GatewayClient::new(&cli.gateway, Duration::from_secs(cli.timeout));

    match &cli.command {
        Command::Keygen => {
            let keypair = Keypair::random();
            print_json(&serde_json::json!({
                "account_id": keypair.account_id(),
                "secret_seed": keypair.secret_seed(),
            }))?;
        }
        Command::Describe { code } => {
            // 説明モードはレジャーに接続しない
            let ledger = MockLedger::new(TESTNET_PASSPHRASE);
            let credentials = EnvCredential::default();
            let result = IssuanceWorkflow::new(&ledger, &credentials, IssuanceSettings::default())
                .issue(IssuanceRequest::describe(code))
                .await;
            match result.into_response_body() {
                Ok(body) => print_json(&body)?,
                Err(body) => {
                    print_json(&body)?;
                    anyhow::bail!("{} ({ISSUER_SECRET_ENV})", body.message);
                }
            }
        }
        Command::Issue {
            code,
            amount,
            destination,
            destination_secret_env,
        } => {
            let destination_secret = destination_secret_env
                .as_deref()
                .map(|var| {
                    std::env::var(var).with_context(|| format!("環境変数 {var} が未設定です"))
                })
                .transpose()?;
            let request = CreateTokenRequest {
                token_code: Some(code.clone()),
                amount: Some(AmountField::Text(amount.clone())),
                destination_account: Some(destination.clone()),
                destination_secret,
            };
            tracing::info!(token_code = %code, destination = %destination, "発行リクエストを送信します");
            let response = gateway()?.create_token(&request).await;
            report(response)?;
        }
        Command::Issuer => report(gateway()?.issuer().await)?,
        Command::Ping => report(gateway()?.ping().await)?,
    }

    Ok(())
}

/// 成功時はレスポンスを表示し、失敗時は失敗レスポンスを表示してエラーを返す。
fn report<T: serde::Serialize>(result: Result<T, ClientError>) -> anyhow::Result<()> {
    match result {
        Ok(body) => print_json(&body),
        Err(ClientError::Api { status, body }) => {
            print_json(&body)?;
            anyhow::bail!("HTTP {status}: {}", body.error)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
