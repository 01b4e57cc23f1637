//! # トランザクション構築
//!
//! 発行者アカウントを起点に操作列を組み立て、XDRエンベロープとして署名・直列化する。
//!
//! ## 構造
//! - [`TransactionBuilder`] — 発行者アカウントのシーケンス番号を1回だけ消費して [`Transaction`] を構築
//! - [`Transaction`] — 署名対象。ハッシュは `TransactionSignaturePayload` のXDRのSHA-256
//! - [`SignedTransaction`] — 署名を付与したエンベロープ。レジャーへの送信単位
//!
//! XDR表現は `stellar-xdr` の型に変換して直列化する。

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use stellar_xdr::curr as xdr;
use stellar_xdr::curr::{Limits, WriteXdr};
use tokenforge_crypto::{decode_account_id, hash_hex, network_id, sha256, CryptoError, Keypair};

use crate::asset::AssetDescriptor;
use crate::ledger::AccountState;

/// 1操作あたりの基本手数料（stroop）
pub const BASE_FEE: u32 = 100;

/// トランザクション有効期限のデフォルト（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// トランザクション有効期限の上限（秒）
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// 1トランザクションあたりの最大操作数
pub const MAX_OPERATIONS: usize = 100;

/// 1エンベロープあたりの最大署名数
pub const MAX_SIGNATURES: usize = 20;

/// トランザクション構築のエラー型
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// 操作が1つもない
    #[error("transaction has no operations")]
    NoOperations,
    /// 操作数が上限を超過
    #[error("transaction has too many operations: {0} (max {MAX_OPERATIONS})")]
    TooManyOperations(usize),
    /// 手数料の計算がu32を超過
    #[error("transaction fee overflow")]
    FeeOverflow,
    /// `set_timeout` が呼ばれていない
    #[error("transaction timeout must be set before build")]
    MissingTimeout,
    /// 有効期間が `1..=MAX_TIMEOUT_SECS` の範囲外
    #[error("transaction timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds: {0}")]
    InvalidTimeout(u64),
    /// 有効終了時刻の計算がu64を超過
    #[error("transaction max time overflow")]
    TimeoutOverflow,
    /// シーケンス番号がi64の上限に達している
    #[error("account sequence number exhausted: {0}")]
    SequenceOverflow(i64),
    /// 署名数が上限を超過
    #[error("transaction has too many signatures (max {MAX_SIGNATURES})")]
    TooManySignatures,
    /// アカウントIDのデコードに失敗
    #[error("invalid account {account}: {source}")]
    InvalidAccount {
        /// 不正なアカウントID
        account: String,
        /// デコードエラー
        source: CryptoError,
    },
    /// システム時刻の取得に失敗
    #[error("system clock error: {0}")]
    Clock(String),
    /// XDRの直列化に失敗
    #[error("xdr encoding failed: {0}")]
    Xdr(String),
}

impl From<stellar_xdr::curr::Error> for TransactionError {
    fn from(e: stellar_xdr::curr::Error) -> Self {
        TransactionError::Xdr(e.to_string())
    }
}

/// 有効期間（秒）を検証する。0（無期限）と上限超過は受け付けない。
pub fn validate_timeout(secs: u64) -> Result<u64, TransactionError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(TransactionError::InvalidTimeout(secs));
    }
    Ok(secs)
}

/// レジャー操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// trustlineの作成・変更。通常は配布先アカウントを `source` とする。
    ChangeTrust {
        /// 操作の実行アカウント（Noneならトランザクションのsource）
        source: Option<String>,
        /// 対象アセット
        asset: AssetDescriptor,
        /// 保有上限（stroop）
        limit: i64,
    },
    /// アセットの送金。発行者から送る場合は新規発行となる。
    Payment {
        /// 操作の実行アカウント（Noneならトランザクションのsource）
        source: Option<String>,
        /// 送金先アカウントID
        destination: String,
        /// 送金アセット
        asset: AssetDescriptor,
        /// 送金量（stroop）
        amount: i64,
    },
}

impl Operation {
    /// 上限なしのChangeTrust操作を作成する。
    pub fn change_trust(asset: AssetDescriptor, source: Option<String>) -> Self {
        Operation::ChangeTrust {
            source,
            asset,
            limit: i64::MAX,
        }
    }

    /// Payment操作を作成する。
    pub fn payment(destination: &str, asset: AssetDescriptor, amount: i64) -> Self {
        Operation::Payment {
            source: None,
            destination: destination.to_string(),
            asset,
            amount,
        }
    }

    /// 操作固有のsourceアカウント
    pub fn source(&self) -> Option<&str> {
        match self {
            Operation::ChangeTrust { source, .. } | Operation::Payment { source, .. } => {
                source.as_deref()
            }
        }
    }

    /// 操作種別名（Horizonの `type` 表記）
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::ChangeTrust { .. } => "change_trust",
            Operation::Payment { .. } => "payment",
        }
    }

    /// XDR `Operation` に変換する。
    pub(crate) fn to_xdr_operation(&self) -> Result<xdr::Operation, TransactionError> {
        let source_account = self.source().map(muxed_account).transpose()?;
        let body = match self {
            Operation::ChangeTrust { asset, limit, .. } => {
                xdr::OperationBody::ChangeTrust(xdr::ChangeTrustOp {
                    line: asset.to_change_trust_asset(),
                    limit: *limit,
                })
            }
            Operation::Payment {
                destination,
                asset,
                amount,
                ..
            } => xdr::OperationBody::Payment(xdr::PaymentOp {
                destination: muxed_account(destination)?,
                asset: asset.to_xdr_asset(),
                amount: *amount,
            }),
        };
        Ok(xdr::Operation {
            source_account,
            body,
        })
    }
}

/// 有効期間（UNIX秒）。ビルダーが構築したトランザクションは常に `max_time > 0`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    /// 有効開始時刻
    pub min_time: u64,
    /// 有効終了時刻
    pub max_time: u64,
}

/// 署名前のトランザクション。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    source_account: String,
    fee: u32,
    sequence: i64,
    time_bounds: TimeBounds,
    operations: Vec<Operation>,
    network_passphrase: String,
}

impl Transaction {
    /// トランザクションのsourceアカウント（手数料支払者・シーケンス番号の所有者）
    pub fn source_account(&self) -> &str {
        &self.source_account
    }

    /// 合計手数料（stroop）
    pub fn fee(&self) -> u32 {
        self.fee
    }

    /// 使用するシーケンス番号
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// 有効期間
    pub fn time_bounds(&self) -> TimeBounds {
        self.time_bounds
    }

    /// 操作列（適用順）
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// ネットワークパスフレーズ
    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// 署名が必要なアカウントの一覧（重複なし、トランザクションsourceが先頭）。
    pub fn required_signers(&self) -> Vec<&str> {
        let mut signers = vec![self.source_account.as_str()];
        for op in &self.operations {
            if let Some(source) = op.source() {
                if !signers.contains(&source) {
                    signers.push(source);
                }
            }
        }
        signers
    }

    /// XDR `Transaction` に変換する。
    pub fn to_xdr_transaction(&self) -> Result<xdr::Transaction, TransactionError> {
        let operations = self
            .operations
            .iter()
            .map(Operation::to_xdr_operation)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(xdr::Transaction {
            source_account: muxed_account(&self.source_account)?,
            fee: self.fee,
            seq_num: xdr::SequenceNumber(self.sequence),
            cond: xdr::Preconditions::Time(xdr::TimeBounds {
                min_time: xdr::TimePoint(self.time_bounds.min_time),
                max_time: xdr::TimePoint(self.time_bounds.max_time),
            }),
            memo: xdr::Memo::None,
            operations: operations.try_into()?,
            ext: xdr::TransactionExt::V0,
        })
    }

    /// XDR `Transaction` のバイト列。
    pub fn to_xdr(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(self.to_xdr_transaction()?.to_xdr(Limits::none())?)
    }

    /// 署名対象ハッシュ（`TransactionSignaturePayload` のSHA-256）。
    pub fn hash(&self) -> Result<[u8; 32], TransactionError> {
        let payload = xdr::TransactionSignaturePayload {
            network_id: xdr::Hash(network_id(&self.network_passphrase)),
            tagged_transaction: xdr::TransactionSignaturePayloadTaggedTransaction::Tx(
                self.to_xdr_transaction()?,
            ),
        };
        Ok(sha256(&payload.to_xdr(Limits::none())?))
    }
}

/// `DecoratedSignature`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
    /// 署名者公開鍵の末尾4バイト
    pub hint: [u8; 4],
    /// Ed25519署名
    pub signature: [u8; 64],
}

/// 署名付きトランザクション（`TransactionV1Envelope`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: Transaction,
    hash: [u8; 32],
    signatures: Vec<DecoratedSignature>,
}

impl SignedTransaction {
    /// 未署名のエンベロープを作成し、署名対象ハッシュを確定する。
    pub fn new(transaction: Transaction) -> Result<Self, TransactionError> {
        let hash = transaction.hash()?;
        Ok(Self {
            transaction,
            hash,
            signatures: Vec::new(),
        })
    }

    /// キーペアで署名を追加する。
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), TransactionError> {
        if self.signatures.len() >= MAX_SIGNATURES {
            return Err(TransactionError::TooManySignatures);
        }
        self.signatures.push(DecoratedSignature {
            hint: keypair.signature_hint(),
            signature: keypair.sign(&self.hash),
        });
        Ok(())
    }

    /// 署名対象のトランザクション
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// 署名対象ハッシュ
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// ハッシュのhex表現（Horizonのトランザクションハッシュ）
    pub fn hash_hex(&self) -> String {
        hash_hex(&self.hash)
    }

    /// 付与済みの署名
    pub fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }

    /// XDR `TransactionEnvelope`（`ENVELOPE_TYPE_TX`）に変換する。
    pub fn to_envelope(&self) -> Result<xdr::TransactionEnvelope, TransactionError> {
        let signatures = self
            .signatures
            .iter()
            .map(|sig| {
                Ok(xdr::DecoratedSignature {
                    hint: xdr::SignatureHint(sig.hint),
                    signature: xdr::Signature(sig.signature.to_vec().try_into()?),
                })
            })
            .collect::<Result<Vec<_>, TransactionError>>()?;
        Ok(xdr::TransactionEnvelope::Tx(xdr::TransactionV1Envelope {
            tx: self.transaction.to_xdr_transaction()?,
            signatures: signatures.try_into()?,
        }))
    }

    /// XDR `TransactionEnvelope` のバイト列。
    pub fn to_envelope_xdr(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(self.to_envelope()?.to_xdr(Limits::none())?)
    }

    /// Base64エンコードしたエンベロープ（Horizonの `tx` パラメータ）。
    pub fn to_envelope_base64(&self) -> Result<String, TransactionError> {
        let bytes = self.to_envelope_xdr()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// 発行者アカウントを起点とするトランザクションビルダー。
///
/// `build` 時にsourceアカウントのシーケンス番号を1回だけインクリメントする。
pub struct TransactionBuilder<'a> {
    source: &'a mut AccountState,
    base_fee: u32,
    network_passphrase: String,
    operations: Vec<Operation>,
    timeout_secs: Option<u64>,
}

impl<'a> TransactionBuilder<'a> {
    /// ビルダーを作成する。`base_fee` は1操作あたりの手数料。
    pub fn new(source: &'a mut AccountState, base_fee: u32, network_passphrase: &str) -> Self {
        Self {
            source,
            base_fee,
            network_passphrase: network_passphrase.to_string(),
            operations: Vec::new(),
            timeout_secs: None,
        }
    }

    /// 操作を末尾に追加する。
    pub fn add_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// 有効期間を現在時刻から `secs` 秒に設定する。`1..=MAX_TIMEOUT_SECS` のみ有効。
    pub fn set_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// 追加済みの操作数
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// トランザクションを確定する。
    pub fn build(self) -> Result<Transaction, TransactionError> {
        if self.operations.is_empty() {
            return Err(TransactionError::NoOperations);
        }
        if self.operations.len() > MAX_OPERATIONS {
            return Err(TransactionError::TooManyOperations(self.operations.len()));
        }
        let timeout_secs = self.timeout_secs.ok_or(TransactionError::MissingTimeout)?;
        let timeout_secs = validate_timeout(timeout_secs)?;

        let fee = self
            .base_fee
            .checked_mul(self.operations.len() as u32)
            .ok_or(TransactionError::FeeOverflow)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TransactionError::Clock(e.to_string()))?
            .as_secs();
        let max_time = now
            .checked_add(timeout_secs)
            .ok_or(TransactionError::TimeoutOverflow)?;

        // アカウントIDを先に検証し、失敗時はシーケンス番号を消費しない
        decode_account_id(&self.source.account_id).map_err(|source| {
            TransactionError::InvalidAccount {
                account: self.source.account_id.clone(),
                source,
            }
        })?;

        let sequence = self
            .source
            .sequence
            .checked_add(1)
            .ok_or(TransactionError::SequenceOverflow(self.source.sequence))?;
        self.source.sequence = sequence;

        Ok(Transaction {
            source_account: self.source.account_id.clone(),
            fee,
            sequence,
            time_bounds: TimeBounds {
                min_time: 0,
                max_time,
            },
            operations: self.operations,
            network_passphrase: self.network_passphrase,
        })
    }
}

/// アカウントIDを `MuxedAccount`（KEY_TYPE_ED25519）に変換する。
fn muxed_account(account_id: &str) -> Result<xdr::MuxedAccount, TransactionError> {
    let key = decode_account_id(account_id).map_err(|source| TransactionError::InvalidAccount {
        account: account_id.to_string(),
        source,
    })?;
    Ok(xdr::MuxedAccount::Ed25519(xdr::Uint256(key)))
}
