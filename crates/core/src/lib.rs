//! # Tokenforge Core
//!
//! Stellar 上でのカスタムアセット発行ワークフローを実装する。
//!
//! ## 処理フロー
//! 1. リクエストを検証する（ネットワーク通信なし）
//! 2. 発行者・配布先アカウントをレジャーから読み込む
//! 3. 配布先のtrustline有無を判定し、操作列（ChangeTrust → Payment）を組み立てる
//! 4. 署名して送信し、レジャーの応答を構造化された結果に変換する
//!
//! レジャーへのアクセスは [`ledger::LedgerClient`] トレイトで抽象化されており、
//! トランザクションの構築・署名はこのクレート内で完結する。

pub mod amount;
pub mod asset;
pub mod issuance;
pub mod ledger;
pub mod transaction;

pub use asset::AssetDescriptor;
pub use issuance::{IssuanceError, IssuanceRequest, IssuanceResult, IssuanceWorkflow};
pub use ledger::{AccountState, LedgerClient, LedgerError};
pub use transaction::{SignedTransaction, Transaction, TransactionBuilder};
