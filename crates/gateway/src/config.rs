//! # Gateway設定・共有状態
//!
//! 環境変数から読み込んだ設定とGatewayの共有状態の定義。

use tokenforge_core::issuance::{CredentialSource, IssuanceSettings};
use tokenforge_core::LedgerClient;

/// `/api/ping` のデフォルト応答
pub const DEFAULT_PING_MESSAGE: &str = "ping";

/// Gatewayの共有状態。起動後は不変。
pub struct GatewayState {
    /// レジャーアクセス（Horizon またはモック、トレイトで抽象化）
    pub ledger: Box<dyn LedgerClient>,
    /// 発行者シードの取得元（リクエストごとに読み込む）
    pub credentials: Box<dyn CredentialSource>,
    /// 手数料・有効期間
    pub settings: IssuanceSettings,
    /// `PING_MESSAGE` の値
    pub ping_message: Option<String>,
    /// 実行環境名（`APP_ENV`）
    pub app_env: String,
    /// 接続先レジャーの表示名（Horizon URL、モック時は `mock`）
    pub ledger_url: String,
}
