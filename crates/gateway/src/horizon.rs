//! # Horizon クライアント
//!
//! Horizon REST API に対する [`LedgerClient`] 実装。
//!
//! - `GET /accounts/{id}` — シーケンス番号と残高の読み込み
//! - `POST /transactions` — `tx=<Base64 XDR>` のフォーム送信
//!
//! 送信は1回のみ行い、リトライしない。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokenforge_core::ledger::{AccountState, LedgerClient, LedgerError, SubmitResponse};
use tokenforge_core::SignedTransaction;
use tokenforge_types::{HorizonAccount, HorizonProblem, HorizonSubmitResponse};

/// Horizon REST API クライアント。
pub struct HorizonClient {
    http_client: reqwest::Client,
    base_url: String,
    network_passphrase: String,
}

impl HorizonClient {
    /// タイムアウト付きのHTTPクライアントで構築する。
    pub fn new(
        base_url: &str,
        network_passphrase: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, base_url, network_passphrase))
    }

    /// 既存のHTTPクライアントで構築する。
    pub fn with_client(
        http_client: reqwest::Client,
        base_url: &str,
        network_passphrase: &str,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            network_passphrase: network_passphrase.to_string(),
        }
    }

    /// 接続先URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LedgerClient for HorizonClient {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn load_account(&self, account_id: &str) -> Result<AccountState, LedgerError> {
        let url = format!("{}/accounts/{}", self.base_url, account_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Network(format!("Horizonへの接続に失敗: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(LedgerError::NotFound(account_id.to_string())),
            StatusCode::BAD_REQUEST => {
                return Err(LedgerError::InvalidAccountId(account_id.to_string()))
            }
            status if !status.is_success() => {
                return Err(LedgerError::Network(format!(
                    "Horizonがエラーを返しました: HTTP {status}"
                )))
            }
            _ => {}
        }

        let account: HorizonAccount = response
            .json()
            .await
            .map_err(|e| LedgerError::Network(format!("アカウント情報のパースに失敗: {e}")))?;
        let sequence = account.sequence.parse::<i64>().map_err(|e| {
            LedgerError::Network(format!("不正なシーケンス番号 {}: {e}", account.sequence))
        })?;

        tracing::debug!(
            account = %account.account_id,
            sequence,
            balances = account.balances.len(),
            "アカウントを読み込みました"
        );

        Ok(AccountState {
            account_id: account.account_id,
            sequence,
            balances: account.balances,
        })
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<SubmitResponse, LedgerError> {
        let envelope = transaction
            .to_envelope_base64()
            .map_err(|e| LedgerError::Transport(format!("エンベロープの直列化に失敗: {e}")))?;
        let url = format!("{}/transactions", self.base_url);

        tracing::info!(
            tx_hash = %transaction.hash_hex(),
            operations = transaction.transaction().operations().len(),
            "トランザクションを送信します"
        );

        let response = self
            .http_client
            .post(&url)
            .form(&[("tx", envelope.as_str())])
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("トランザクション送信に失敗: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: HorizonSubmitResponse = response.json().await.map_err(|e| {
                LedgerError::Transport(format!("送信レスポンスのパースに失敗: {e}"))
            })?;
            return Ok(SubmitResponse {
                hash: body.hash,
                ledger: body.ledger,
            });
        }

        // 結果コード付きの拒否は 400 で返る。それ以外（504 等）は結果不明として扱う
        let problem: Option<HorizonProblem> = response.json().await.ok();
        if status == StatusCode::BAD_REQUEST {
            if let Some(result_codes) = problem
                .as_ref()
                .and_then(|p| p.extras.as_ref())
                .and_then(|extras| extras.result_codes.clone())
            {
                return Err(LedgerError::Rejected { result_codes });
            }
        }

        let detail = problem
            .map(|p| match p.detail {
                Some(detail) => format!("{}: {detail}", p.title),
                None => p.title,
            })
            .unwrap_or_default();
        Err(LedgerError::Transport(format!("HTTP {status} {detail}").trim_end().to_string()))
    }
}
