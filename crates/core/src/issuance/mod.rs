//! # トークン発行ワークフロー
//!
//! ## 処理フロー
//! 1. アセットコードの検証（未指定 → 形式）
//! 2. 発行者シードの取得（リクエストごとに遅延読み込み）
//! 3. 配布先未指定なら発行内容の説明のみ返す（レジャー通信なし）
//! 4. 発行者・配布先アカウントの読み込み
//! 5. 配布先のtrustline有無を判定し、ChangeTrust（必要時）→ Payment を組み立てる
//! 6. 発行者で署名し、trustline作成時は配布先シードでも署名する
//! 7. 送信し、結果またはエラーを [`IssuanceResult`] に変換する
//!
//! リトライは行わない。同一リクエストを再実行すると新しいシーケンス番号で
//! 別のトランザクションが送信されるため、重複排除は呼び出し側の責務となる。

use std::fmt;

use tokenforge_crypto::{strkey, Keypair};
use tokenforge_types::{
    CreateTokenRequest, CreateTokenResponse, ErrorResponse, ResultCodes, TokenDetails,
    DEFAULT_ISSUE_AMOUNT,
};

use crate::amount::{parse_amount, AmountError};
use crate::asset::{validate_token_code, AssetDescriptor, AssetError};
use crate::ledger::{LedgerClient, LedgerError};
use crate::transaction::{
    validate_timeout, Operation, SignedTransaction, TransactionBuilder, TransactionError,
    BASE_FEE, DEFAULT_TIMEOUT_SECS,
};


/// 発行者シードを保持する環境変数
pub const ISSUER_SECRET_ENV: &str = "STELLAR_SECRET_KEY";

// ---------------------------------------------------------------------------
// 発行者シードの取得
// ---------------------------------------------------------------------------

/// 発行者シードの取得元。リクエストごとに呼び出される。
pub trait CredentialSource: Send + Sync {
    /// 設定済みのシード。未設定・空文字なら `None`。
    fn issuer_secret(&self) -> Option<String>;
}

/// 環境変数からシードを読み込む。
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    /// 指定した環境変数を読み込む取得元を作成する。
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(ISSUER_SECRET_ENV)
    }
}

impl CredentialSource for EnvCredential {
    fn issuer_secret(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|s| !s.trim().is_empty())
    }
}

/// 固定値のシード（テスト・CLI用）。
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    /// シードを保持する取得元を作成する。
    pub fn new(secret: Option<String>) -> Self {
        Self(secret)
    }
}

impl CredentialSource for StaticCredential {
    fn issuer_secret(&self) -> Option<String> {
        self.0.clone().filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// 入出力
// ---------------------------------------------------------------------------

/// 発行リクエスト。
#[derive(Clone, Default)]
pub struct IssuanceRequest {
    /// アセットコード
    pub token_code: String,
    /// 発行量（小数点表記）
    pub amount: String,
    /// 配布先アカウントID
    pub destination_account: Option<String>,
    /// 配布先シード
    pub destination_secret: Option<String>,
}

impl IssuanceRequest {
    /// 説明モードのリクエストを作成する。
    pub fn describe(token_code: &str) -> Self {
        Self {
            token_code: token_code.to_string(),
            amount: DEFAULT_ISSUE_AMOUNT.to_string(),
            ..Default::default()
        }
    }

    /// 発行モードのリクエストを作成する。
    pub fn issue(token_code: &str, amount: &str, destination_account: &str) -> Self {
        Self {
            token_code: token_code.to_string(),
            amount: amount.to_string(),
            destination_account: Some(destination_account.to_string()),
            destination_secret: None,
        }
    }

    /// 配布先シードを付与する。
    pub fn with_destination_secret(mut self, secret: &str) -> Self {
        self.destination_secret = Some(secret.to_string());
        self
    }
}

impl From<CreateTokenRequest> for IssuanceRequest {
    fn from(body: CreateTokenRequest) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            token_code: body.token_code.unwrap_or_default(),
            amount: body
                .amount
                .map(|a| a.to_decimal_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ISSUE_AMOUNT.to_string()),
            destination_account: non_empty(body.destination_account)
                .map(|s| s.trim().to_string()),
            destination_secret: non_empty(body.destination_secret),
        }
    }
}

impl fmt::Debug for IssuanceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuanceRequest")
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

/// 発行ワークフローの設定。
#[derive(Debug, Clone)]
pub struct IssuanceSettings {
    /// 1操作あたりの手数料（stroop）
    pub base_fee: u32,
    /// トランザクションの有効期間（秒）。`1..=MAX_TIMEOUT_SECS`
    pub timeout_secs: u64,
}

impl IssuanceSettings {
    /// 設定値を検証する。有効期間が0（無期限）または上限超過ならエラー。
    pub fn validate(&self) -> Result<(), TransactionError> {
        validate_timeout(self.timeout_secs)?;
        Ok(())
    }
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            base_fee: BASE_FEE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// 発行に成功したトークンの情報。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// 発行アセット
    pub asset: AssetDescriptor,
    /// 発行量（リクエストの表記のまま）
    pub amount: String,
    /// 配布先アカウントID
    pub destination: String,
    /// トランザクションハッシュ
    pub transaction_hash: String,
    /// 取り込まれたレジャー番号
    pub ledger: Option<u64>,
    /// 送信した操作の種別（適用順）
    pub operations: Vec<&'static str>,
}

impl IssuedToken {
    /// 同一トランザクションでtrustlineを作成したか
    pub fn established_trustline(&self) -> bool {
        self.operations.contains(&"change_trust")
    }
}

/// 失敗の分類。HTTPステータスの決定に使用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// リクエストは正しく構成されていないか、ネットワークに拒否された（400）
    Client,
    /// 設定不備・通信障害・想定外のエラー（500）
    Server,
}

/// 発行ワークフローのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    /// 入力不正。レジャー通信は行われていない。
    #[error("{0}")]
    Validation(String),
    /// 発行者シードの設定不備
    #[error("{0}")]
    Configuration(String),
    /// アカウントの読み込みに失敗
    #[error("failed to load account {account}: {source}")]
    LedgerLoad {
        /// 対象アカウント
        account: String,
        /// レジャーエラー
        source: LedgerError,
    },
    /// ネットワークがトランザクションを拒否した
    #[error("transaction rejected by the network: {}", .result_codes.transaction)]
    SubmissionRejected {
        /// 結果コード（そのまま呼び出し元へ返す）
        result_codes: ResultCodes,
    },
    /// 送信時の通信障害、または想定外の失敗
    #[error("{0}")]
    Transport(String),
}

impl IssuanceError {
    /// 失敗の分類
    pub fn class(&self) -> FailureClass {
        match self {
            IssuanceError::Validation(_) | IssuanceError::SubmissionRejected { .. } => {
                FailureClass::Client
            }
            IssuanceError::LedgerLoad {
                source: LedgerError::InvalidAccountId(_),
                ..
            } => FailureClass::Client,
            IssuanceError::Configuration(_)
            | IssuanceError::LedgerLoad { .. }
            | IssuanceError::Transport(_) => FailureClass::Server,
        }
    }

    /// HTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self.class() {
            FailureClass::Client => 400,
            FailureClass::Server => 500,
        }
    }

    /// レスポンスの `error` フィールド
    pub fn summary(&self) -> &'static str {
        match self {
            IssuanceError::Validation(_) => "Invalid token issuance request",
            IssuanceError::Configuration(_) => "Issuer not configured",
            IssuanceError::LedgerLoad { .. } => "Failed to load account from Stellar",
            IssuanceError::SubmissionRejected { .. } => "Failed to create token on Stellar",
            IssuanceError::Transport(_) => "Failed to create token",
        }
    }

    /// 構造化結果コード（ネットワーク拒否時のみ）
    pub fn result_codes(&self) -> Option<&ResultCodes> {
        match self {
            IssuanceError::SubmissionRejected { result_codes } => Some(result_codes),
            _ => None,
        }
    }

    /// 失敗レスポンスに変換する。
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: self.summary().to_string(),
            message: self.to_string(),
            details: self.result_codes().cloned(),
        }
    }
}

impl From<AssetError> for IssuanceError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::MissingCode | AssetError::InvalidCode => {
                IssuanceError::Validation(e.to_string())
            }
            // 発行者アカウントIDはシードから導出するため、ここに到達するのは内部不整合のみ
            AssetError::InvalidIssuer(_) => IssuanceError::Transport(e.to_string()),
        }
    }
}

impl From<AmountError> for IssuanceError {
    fn from(e: AmountError) -> Self {
        IssuanceError::Validation(format!("invalid amount: {e}"))
    }
}

impl From<TransactionError> for IssuanceError {
    fn from(e: TransactionError) -> Self {
        IssuanceError::Transport(format!("failed to build transaction: {e}"))
    }
}

/// 発行ワークフローの結果。
#[derive(Debug)]
pub enum IssuanceResult {
    /// 説明モード（配布先未指定）
    Described {
        /// 発行予定のアセット
        asset: AssetDescriptor,
    },
    /// 発行完了
    Issued(IssuedToken),
    /// 失敗
    Failed(IssuanceError),
}

impl IssuanceResult {
    /// 成功したか
    pub fn is_success(&self) -> bool {
        !matches!(self, IssuanceResult::Failed(_))
    }

    /// HTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self {
            IssuanceResult::Failed(e) => e.status_code(),
            _ => 200,
        }
    }

    /// 失敗時のエラー
    pub fn error(&self) -> Option<&IssuanceError> {
        match self {
            IssuanceResult::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// HTTPレスポンスボディに変換する。
    pub fn into_response_body(self) -> Result<CreateTokenResponse, ErrorResponse> {
        match self {
            IssuanceResult::Described { asset } => Ok(CreateTokenResponse {
                success: true,
                message: format!(
                    "Token {} is ready to be issued by {}",
                    asset.code(),
                    asset.issuer()
                ),
                transaction_hash: None,
                token_details: TokenDetails {
                    code: asset.code().to_string(),
                    issuer: asset.issuer().to_string(),
                    asset: asset.to_string(),
                    amount_issued: None,
                    distributed_to: None,
                    next_steps: Some(vec![
                        "To distribute tokens, provide a destination account and call this endpoint again".to_string(),
                        "Recipients must establish a trustline to this asset before they can receive it".to_string(),
                    ]),
                },
            }),
            IssuanceResult::Issued(token) => Ok(CreateTokenResponse {
                success: true,
                message: format!(
                    "Successfully issued {} {} to {}",
                    token.amount,
                    token.asset.code(),
                    token.destination
                ),
                transaction_hash: Some(token.transaction_hash.clone()),
                token_details: TokenDetails {
                    code: token.asset.code().to_string(),
                    issuer: token.asset.issuer().to_string(),
                    asset: token.asset.to_string(),
                    amount_issued: Some(token.amount),
                    distributed_to: Some(token.destination),
                    next_steps: None,
                },
            }),
            IssuanceResult::Failed(e) => Err(e.to_response()),
        }
    }
}

impl From<Result<IssuanceResult, IssuanceError>> for IssuanceResult {
    fn from(result: Result<IssuanceResult, IssuanceError>) -> Self {
        result.unwrap_or_else(IssuanceResult::Failed)
    }
}

// ---------------------------------------------------------------------------
// ワークフロー
// ---------------------------------------------------------------------------

/// トークン発行ワークフロー。リクエストごとに構築する。
pub struct IssuanceWorkflow<'a> {
    ledger: &'a dyn LedgerClient,
    credentials: &'a dyn CredentialSource,
    settings: IssuanceSettings,
}

impl<'a> IssuanceWorkflow<'a> {
    /// ワークフローを作成する。
    pub fn new(
        ledger: &'a dyn LedgerClient,
        credentials: &'a dyn CredentialSource,
        settings: IssuanceSettings,
    ) -> Self {
        Self {
            ledger,
            credentials,
            settings,
        }
    }

    /// 発行リクエストを処理する。全ての失敗は [`IssuanceResult::Failed`] として返る。
    pub async fn issue(&self, request: IssuanceRequest) -> IssuanceResult {
        let result = self.try_issue(&request).await;
        match &result {
            Ok(IssuanceResult::Issued(token)) => tracing::info!(
                asset = %token.asset,
                destination = %token.destination,
                amount = %token.amount,
                tx_hash = %token.transaction_hash,
                operations = ?token.operations,
                "トークンを発行しました"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(
                token_code = %request.token_code,
                destination = ?request.destination_account,
                status = e.status_code(),
                error = %e,
                "トークン発行に失敗しました"
            ),
        }
        result.into()
    }

    async fn try_issue(&self, request: &IssuanceRequest) -> Result<IssuanceResult, IssuanceError> {
        // Step 1: アセットコードの検証
        validate_token_code(&request.token_code)?;

        // Step 2: 発行者シード（リクエストごとに読み込む）
        let issuer = self.issuer_keypair()?;
        let issuer_id = issuer.account_id();

        // Step 3: 説明モード
        let Some(destination) = request.destination_account.as_deref() else {
            let asset = AssetDescriptor::new(&request.token_code, &issuer_id)?;
            tracing::info!(asset = %asset, "配布先未指定のため発行内容のみ返します");
            return Ok(IssuanceResult::Described { asset });
        };

        let amount = parse_amount(&request.amount)?;
        if !strkey::is_valid_account_id(destination) {
            return Err(IssuanceError::LedgerLoad {
                account: destination.to_string(),
                source: LedgerError::InvalidAccountId(destination.to_string()),
            });
        }

        tracing::info!(
            token_code = %request.token_code,
            issuer = %issuer_id,
            destination = %destination,
            amount = %request.amount,
            "トークン発行を開始します"
        );

        // Step 4: アカウントの読み込み（発行者 → 配布先）
        let mut issuer_account = self.load(&issuer_id).await?;
        let destination_account = self.load(destination).await?;

        // Step 5: trustline判定と操作列の組み立て
        let asset = AssetDescriptor::new(&request.token_code, &issuer_id)?;
        let needs_trustline = !destination_account.has_trustline(&asset);
        tracing::debug!(
            asset = %asset,
            needs_trustline,
            sequence = issuer_account.sequence,
            "操作列を組み立てます"
        );

        let mut builder = TransactionBuilder::new(
            &mut issuer_account,
            self.settings.base_fee,
            self.ledger.network_passphrase(),
        );
        if needs_trustline {
            builder = builder.add_operation(Operation::change_trust(
                asset.clone(),
                Some(destination.to_string()),
            ));
        }
        let transaction = builder
            .add_operation(Operation::payment(destination, asset.clone(), amount))
            .set_timeout(self.settings.timeout_secs)
            .build()?;
        let operations: Vec<&'static str> =
            transaction.operations().iter().map(|op| op.kind()).collect();

        // Step 6: 署名
        let mut signed = SignedTransaction::new(transaction)?;
        signed.sign(&issuer)?;
        if needs_trustline {
            match request.destination_secret.as_deref() {
                Some(secret) => {
                    let destination_keypair = Keypair::from_secret(secret).map_err(|_| {
                        IssuanceError::Validation("invalid destination secret".to_string())
                    })?;
                    signed.sign(&destination_keypair)?;
                }
                // 署名不足はネットワーク側で拒否される
                None => tracing::debug!(
                    destination = %destination,
                    "配布先シード未指定のため発行者のみで署名します"
                ),
            }
        }

        // Step 7: 送信
        let response = self
            .ledger
            .submit_transaction(&signed)
            .await
            .map_err(|e| match e {
                LedgerError::Rejected { result_codes } => {
                    IssuanceError::SubmissionRejected { result_codes }
                }
                other => IssuanceError::Transport(other.to_string()),
            })?;

        Ok(IssuanceResult::Issued(IssuedToken {
            asset,
            amount: request.amount.clone(),
            destination: destination.to_string(),
            transaction_hash: response.hash,
            ledger: response.ledger,
            operations,
        }))
    }

    /// 発行者キーペアをシードから構築する。
    fn issuer_keypair(&self) -> Result<Keypair, IssuanceError> {
        let secret = self.credentials.issuer_secret().ok_or_else(|| {
            IssuanceError::Configuration("issuer credential not configured".to_string())
        })?;
        Keypair::from_secret(&secret).map_err(|_| {
            IssuanceError::Configuration("issuer credential is not a valid secret seed".to_string())
        })
    }

    async fn load(&self, account_id: &str) -> Result<crate::ledger::AccountState, IssuanceError> {
        self.ledger
            .load_account(account_id)
            .await
            .map_err(|source| IssuanceError::LedgerLoad {
                account: account_id.to_string(),
                source,
            })
    }
}
