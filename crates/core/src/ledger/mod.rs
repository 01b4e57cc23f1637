//! # レジャーアクセスの抽象化
//!
//! アカウント状態の読み込みと署名済みトランザクションの送信を抽象化するトレイト。
//!
//! 現在の実装:
//! - `HorizonClient`（gatewayクレート） — Horizon REST API
//! - [`mock::MockLedger`] — ローカル開発・テスト用のメモリ内レジャー

pub mod mock;

use tokenforge_types::{BalanceLine, ResultCodes};

use crate::asset::AssetDescriptor;
use crate::transaction::SignedTransaction;

/// レジャーから読み込んだアカウント状態。リクエストごとに読み込み、キャッシュしない。
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    /// アカウントID
    pub account_id: String,
    /// 現在のシーケンス番号
    pub sequence: i64,
    /// 残高一覧（native と trustline）
    pub balances: Vec<BalanceLine>,
}

impl AccountState {
    /// 指定アセットのtrustlineを持つか判定する。
    pub fn has_trustline(&self, asset: &AssetDescriptor) -> bool {
        self.trustline(asset).is_some()
    }

    /// 指定アセットの残高行を返す。
    pub fn trustline(&self, asset: &AssetDescriptor) -> Option<&BalanceLine> {
        self.balances.iter().find(|line| asset.matches_balance(line))
    }
}

/// 送信成功時の応答。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// トランザクションハッシュ（hex）
    pub hash: String,
    /// 取り込まれたレジャー番号
    pub ledger: Option<u64>,
}

/// レジャーアクセスのエラー型
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// アカウントが存在しない
    #[error("account not found: {0}")]
    NotFound(String),
    /// アカウントIDの形式が不正
    #[error("malformed account id: {0}")]
    InvalidAccountId(String),
    /// アカウント読み込み時の通信失敗
    #[error("ledger network error: {0}")]
    Network(String),
    /// ネットワークがトランザクションを拒否した（構造化された結果コードあり）
    #[error("transaction rejected: {}", .result_codes.transaction)]
    Rejected {
        /// 結果コード
        result_codes: ResultCodes,
    },
    /// 送信時の通信失敗・タイムアウト・想定外の応答
    #[error("transaction submission failed: {0}")]
    Transport(String),
}

/// レジャーアクセスのトレイト。
///
/// トランザクションの構築と署名は [`crate::transaction`] で行い、
/// 実装はネットワーク通信のみを担当する。
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// 接続先ネットワークのパスフレーズ（署名対象ハッシュの計算に使用）。
    fn network_passphrase(&self) -> &str;

    /// アカウントの現在状態（シーケンス番号・残高）を読み込む。
    async fn load_account(&self, account_id: &str) -> Result<AccountState, LedgerError>;

    /// 署名済みトランザクションを送信する。リトライは行わない。
    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<SubmitResponse, LedgerError>;
}
