//! # Tokenforge 共有型定義
//!
//! Gateway の HTTP 契約と、Horizon（Stellar REST API）のレスポンスを
//! Rust 構造体として提供する。
//!
//! ## エンコーディング規則
//! - StrKey: Stellar アカウントID（`G...`）とシード（`S...`）
//! - Base64: トランザクションエンベロープ（XDR）
//! - Hex: トランザクションハッシュ
//! - 金額: 小数点表記の文字列（例: `"100"`, `"12.5"`）

use serde::{Deserialize, Serialize};

/// `amount` 省略時の発行量。
pub const DEFAULT_ISSUE_AMOUNT: &str = "100";

// ---------------------------------------------------------------------------
// POST /api/stellar/create-token
// ---------------------------------------------------------------------------

/// トークン発行リクエストボディ。
///
/// フロントエンドは camelCase で送信する。
/// `tokenCode` の欠落はJSONパースエラーではなく検証エラーとして扱うため `Option`。
/// `Debug` 出力では `destinationSecret` を伏せる。
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    /// アセットコード（1〜12文字の英数字）
    #[serde(default)]
    pub token_code: Option<String>,
    /// 発行量。文字列・数値のどちらでも受け付ける
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountField>,
    /// 配布先アカウントID。省略時は発行内容の説明のみ返す
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    /// 配布先アカウントのシード（trustline作成時の二重署名用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_secret: Option<String>,
}

impl std::fmt::Debug for CreateTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateTokenRequest")
            .field("token_code", &self.token_code)
            .field("amount", &self.amount)
            .field("destination_account", &self.destination_account)
            .field(
                "destination_secret",
                &self.destination_secret.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// `amount` フィールドの入力形式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    /// `"50"`, `"0.5"`
    Text(String),
    /// `50`, `0.5`
    Number(serde_json::Number),
}

impl AmountField {
    /// 小数点表記の文字列に正規化する。
    pub fn to_decimal_string(&self) -> String {
        match self {
            AmountField::Text(s) => s.trim().to_string(),
            AmountField::Number(n) => n.to_string(),
        }
    }
}

/// 発行対象アセットの詳細。
///
/// 説明モードでは `next_steps` を、発行モードでは `amount_issued` と
/// `distributed_to` を含む。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDetails {
    /// アセットコード
    pub code: String,
    /// 発行者アカウントID
    pub issuer: String,
    /// `CODE:ISSUER` 形式のアセット識別子
    pub asset: String,
    /// 発行量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_issued: Option<String>,
    /// 配布先アカウントID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributed_to: Option<String>,
    /// 説明モードでの次の手順
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
}

/// 成功レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenResponse {
    /// 常に `true`
    pub success: bool,
    /// 人間向けメッセージ
    pub message: String,
    /// 送信したトランザクションのハッシュ（発行モードのみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// アセット詳細
    pub token_details: TokenDetails,
}

/// 失敗レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 常に `false`
    pub success: bool,
    /// エラー分類の要約
    pub error: String,
    /// 詳細メッセージ
    pub message: String,
    /// ネットワークが返した構造化結果コード（存在する場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ResultCodes>,
}

impl ErrorResponse {
    /// 構造化結果コードを持たない失敗レスポンスを構築する。
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Horizon レスポンス
// ---------------------------------------------------------------------------

/// トランザクション拒否時にネットワークが返す結果コード。
/// Horizon の `extras.result_codes` をそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodes {
    /// トランザクション全体の結果（例: `tx_failed`, `tx_bad_seq`）
    pub transaction: String,
    /// 操作ごとの結果（例: `["op_success", "op_no_trust"]`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<String>>,
}

/// アカウントが保有する残高行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    /// 残高（小数点表記）
    pub balance: String,
    /// `native`, `credit_alphanum4`, `credit_alphanum12`, `liquidity_pool_shares`
    pub asset_type: String,
    /// アセットコード（native以外）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    /// アセット発行者（native以外）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,
    /// trustline の上限
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// `GET /accounts/{id}` のレスポンス（使用するフィールドのみ）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonAccount {
    /// アカウントID
    pub account_id: String,
    /// 現在のシーケンス番号（int64 の10進文字列）
    pub sequence: String,
    /// 残高一覧
    #[serde(default)]
    pub balances: Vec<BalanceLine>,
}

/// `POST /transactions` 成功時のレスポンス（使用するフィールドのみ）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonSubmitResponse {
    /// トランザクションハッシュ（hex）
    pub hash: String,
    /// 取り込まれたレジャー番号
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u64>,
    /// 成功フラグ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
}

/// Horizon のエラーレスポンス（RFC 7807 Problem Details）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonProblem {
    /// 問題種別URI
    #[serde(rename = "type", default)]
    pub problem_type: String,
    /// 見出し
    #[serde(default)]
    pub title: String,
    /// HTTPステータス
    #[serde(default)]
    pub status: u16,
    /// 詳細
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// 追加情報（トランザクション失敗時に result_codes を含む）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<HorizonProblemExtras>,
}

/// Horizon エラーの `extras`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonProblemExtras {
    /// 結果コード
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_codes: Option<ResultCodes>,
    /// 送信されたエンベロープ（Base64 XDR）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_xdr: Option<String>,
    /// 結果（Base64 XDR）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_xdr: Option<String>,
}

// ---------------------------------------------------------------------------
// 補助エンドポイント
// ---------------------------------------------------------------------------

/// `GET /api/ping` のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    /// `PING_MESSAGE` の値
    pub message: String,
}

/// `GET /api/stellar/debug-env` のレスポンス。
/// 秘密値そのものは含めない。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DebugEnvResponse {
    /// `"*** (exists)"` または `"Not found"`
    pub stellar_secret_key: String,
    /// `PING_MESSAGE` の値、または `"Not found"`
    pub ping_message: String,
    /// 実行環境名
    pub app_env: String,
    /// 接続先 Horizon
    pub horizon_url: String,
}

/// `GET /api/stellar/issuer` のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerInfo {
    /// 発行者アカウントID
    pub issuer: String,
    /// ネットワークパスフレーズ
    pub network_passphrase: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_token_request_accepts_string_or_number_amount() {
        let body: CreateTokenRequest =
            serde_json::from_str(r#"{"tokenCode":"USD","amount":"12.5","destinationAccount":"GDEST"}"#)
                .unwrap();
        assert_eq!(body.token_code.as_deref(), Some("USD"));
        assert_eq!(body.amount.unwrap().to_decimal_string(), "12.5");
        assert_eq!(body.destination_account.as_deref(), Some("GDEST"));

        let body: CreateTokenRequest = serde_json::from_str(r#"{"tokenCode":"USD","amount":50}"#).unwrap();
        assert_eq!(body.amount, Some(AmountField::Number(serde_json::Number::from(50u64))));

        let body: CreateTokenRequest = serde_json::from_str("{}").unwrap();
        assert!(body.token_code.is_none());
    }

    #[test]
    fn test_create_token_request_debug_hides_secret() {
        let body = CreateTokenRequest {
            token_code: Some("USD".to_string()),
            destination_secret: Some("SSECRET".to_string()),
            ..Default::default()
        };
        let debug = format!("{body:?}");
        assert!(!debug.contains("SSECRET"));
    }

    #[test]
    fn test_response_field_names() {
        let response = CreateTokenResponse {
            success: true,
            message: "ok".to_string(),
            transaction_hash: None,
            token_details: TokenDetails {
                code: "USD".to_string(),
                issuer: "GISSUER".to_string(),
                asset: "USD:GISSUER".to_string(),
                amount_issued: Some("50".to_string()),
                distributed_to: Some("GDEST".to_string()),
                next_steps: None,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("transactionHash").is_none());
        assert_eq!(json["tokenDetails"]["amount_issued"], "50");
        assert!(json["tokenDetails"].get("next_steps").is_none());

        let error = serde_json::to_value(ErrorResponse::new("Failed to create token", "boom")).unwrap();
        assert_eq!(error["success"], false);
        assert!(error.get("details").is_none());
    }

    #[test]
    fn test_horizon_problem_with_result_codes() {
        let problem: HorizonProblem = serde_json::from_str(
            r#"{"type":"https://stellar.org/horizon-errors/transaction_failed","title":"Transaction Failed","status":400,
                "extras":{"result_codes":{"transaction":"tx_failed","operations":["op_no_trust"]}}}"#,
        )
        .unwrap();
        let codes = problem.extras.unwrap().result_codes.unwrap();
        assert_eq!(codes.transaction, "tx_failed");
        assert_eq!(codes.operations, Some(vec!["op_no_trust".to_string()]));
    }
}
