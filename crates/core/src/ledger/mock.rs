//! # メモリ内モックレジャー
//!
//! ネットワークに接続できない開発環境とテストで使用するモック実装。
//! シーケンス番号・有効期限・手数料・署名を検証し、ChangeTrust / Payment を適用する。
//! 拒否時は Horizon と同じ形式の結果コードを返す。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokenforge_crypto::{decode_account_id, ed25519_verify, signature_hint, strkey};
use tokenforge_types::{BalanceLine, ResultCodes};

use super::{AccountState, LedgerClient, LedgerError, SubmitResponse};
use crate::amount::{format_stroops, parse_balance};
use crate::asset::AssetDescriptor;
use crate::transaction::{Operation, SignedTransaction, BASE_FEE};

/// 新規アカウントに付与するnative残高（stroop）
const INITIAL_NATIVE_BALANCE: i64 = 10_000 * 10_000_000;

/// 保持する送信履歴の件数。超過分は古いものから破棄する。
pub const MAX_RECORDED_SUBMISSIONS: usize = 64;

/// 次回の送信で発生させる障害。
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// 結果コード付きの拒否
    Rejected(ResultCodes),
    /// 結果コードを持たない通信障害
    Transport(String),
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, AccountState>,
    ledger_sequence: u64,
    load_calls: usize,
    submit_calls: usize,
    submitted: VecDeque<SignedTransaction>,
    next_submit_failure: Option<InjectedFailure>,
    unreachable: bool,
}

/// モックレジャー。
pub struct MockLedger {
    network_passphrase: String,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// 空のレジャーを作成する。
    pub fn new(network_passphrase: &str) -> Self {
        Self {
            network_passphrase: network_passphrase.to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// アカウントを追加した状態で返す。
    pub fn with_account(self, account_id: &str, sequence: i64) -> Self {
        self.create_account(account_id, sequence);
        self
    }

    /// native残高のみを持つアカウントを作成する。既存なら上書きする。
    pub fn create_account(&self, account_id: &str, sequence: i64) {
        let account = AccountState {
            account_id: account_id.to_string(),
            sequence,
            balances: vec![BalanceLine {
                balance: format_stroops(INITIAL_NATIVE_BALANCE),
                asset_type: "native".to_string(),
                asset_code: None,
                asset_issuer: None,
                limit: None,
            }],
        };
        self.lock().accounts.insert(account_id.to_string(), account);
    }

    /// アカウントにtrustlineを追加する（残高0、上限なし）。
    pub fn add_trustline(&self, account_id: &str, asset: &AssetDescriptor) {
        if let Some(account) = self.lock().accounts.get_mut(account_id) {
            if !account.has_trustline(asset) {
                account.balances.push(new_trustline(asset, i64::MAX));
            }
        }
    }

    /// 次回の `submit_transaction` を指定の障害で失敗させる。
    pub fn fail_next_submit(&self, failure: InjectedFailure) {
        self.lock().next_submit_failure = Some(failure);
    }

    /// 以降の `load_account` を通信障害で失敗させる。
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// `load_account` の呼び出し回数
    pub fn load_calls(&self) -> usize {
        self.lock().load_calls
    }

    /// `submit_transaction` の呼び出し回数
    pub fn submit_calls(&self) -> usize {
        self.lock().submit_calls
    }

    /// 直近に受信したトランザクション（拒否されたものを含む、古い順、最大 [`MAX_RECORDED_SUBMISSIONS`] 件）
    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.lock().submitted.iter().cloned().collect()
    }

    /// アカウントの現在状態
    pub fn account(&self, account_id: &str) -> Option<AccountState> {
        self.lock().accounts.get(account_id).cloned()
    }

    /// アカウントが保有するアセット残高
    pub fn balance(&self, account_id: &str, asset: &AssetDescriptor) -> Option<String> {
        self.lock()
            .accounts
            .get(account_id)
            .and_then(|a| a.trustline(asset).map(|line| line.balance.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// トランザクションを検証・適用する。拒否時は結果コードを返す。
    fn apply(
        &self,
        state: &mut MockState,
        signed: &SignedTransaction,
    ) -> Result<SubmitResponse, ResultCodes> {
        let tx = signed.transaction();

        // 異なるネットワーク向けの署名は検証に通らない
        if tx.network_passphrase() != self.network_passphrase {
            return Err(tx_code("tx_bad_auth"));
        }

        let source = state
            .accounts
            .get(tx.source_account())
            .ok_or_else(|| tx_code("tx_no_source_account"))?;

        if source.sequence.checked_add(1) != Some(tx.sequence()) {
            return Err(tx_code("tx_bad_seq"));
        }

        let max_time = tx.time_bounds().max_time;
        if max_time != 0 && now_secs() > max_time {
            return Err(tx_code("tx_too_late"));
        }

        let min_fee = BASE_FEE.saturating_mul(tx.operations().len() as u32);
        if tx.fee() < min_fee {
            return Err(tx_code("tx_insufficient_fee"));
        }

        for signer in tx.required_signers() {
            if !has_valid_signature(signed, signer) {
                return Err(tx_code("tx_bad_auth"));
            }
        }

        // ここから先はシーケンス番号が消費される
        let mut working = state.accounts.clone();
        if let Some(account) = working.get_mut(tx.source_account()) {
            account.sequence = tx.sequence();
        }

        let mut op_codes = Vec::with_capacity(tx.operations().len());
        for op in tx.operations() {
            match apply_operation(&mut working, op, tx.source_account()) {
                Ok(()) => op_codes.push("op_success".to_string()),
                Err(code) => {
                    op_codes.push(code.to_string());
                    if let Some(account) = state.accounts.get_mut(tx.source_account()) {
                        account.sequence = tx.sequence();
                    }
                    return Err(ResultCodes {
                        transaction: "tx_failed".to_string(),
                        operations: Some(op_codes),
                    });
                }
            }
        }

        state.accounts = working;
        state.ledger_sequence += 1;
        Ok(SubmitResponse {
            hash: signed.hash_hex(),
            ledger: Some(state.ledger_sequence),
        })
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    async fn load_account(&self, account_id: &str) -> Result<AccountState, LedgerError> {
        let mut state = self.lock();
        state.load_calls += 1;

        if state.unreachable {
            return Err(LedgerError::Network("mock ledger is unreachable".to_string()));
        }
        if !strkey::is_valid_account_id(account_id) {
            return Err(LedgerError::InvalidAccountId(account_id.to_string()));
        }
        state
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<SubmitResponse, LedgerError> {
        let mut state = self.lock();
        state.submit_calls += 1;
        if state.submitted.len() >= MAX_RECORDED_SUBMISSIONS {
            state.submitted.pop_front();
        }
        state.submitted.push_back(transaction.clone());

        match state.next_submit_failure.take() {
            Some(InjectedFailure::Rejected(result_codes)) => {
                return Err(LedgerError::Rejected { result_codes });
            }
            Some(InjectedFailure::Transport(message)) => {
                return Err(LedgerError::Transport(message));
            }
            None => {}
        }

        self.apply(&mut state, transaction)
            .map_err(|result_codes| LedgerError::Rejected { result_codes })
    }
}

fn tx_code(code: &str) -> ResultCodes {
    ResultCodes {
        transaction: code.to_string(),
        operations: None,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn new_trustline(asset: &AssetDescriptor, limit: i64) -> BalanceLine {
    BalanceLine {
        balance: format_stroops(0),
        asset_type: asset.asset_type().to_string(),
        asset_code: Some(asset.code().to_string()),
        asset_issuer: Some(asset.issuer().to_string()),
        limit: Some(format_stroops(limit)),
    }
}

/// 署名者の公開鍵で検証できる署名がエンベロープに含まれるか。
fn has_valid_signature(signed: &SignedTransaction, signer: &str) -> bool {
    let Ok(public_key) = decode_account_id(signer) else {
        return false;
    };
    let hint = signature_hint(&public_key);
    signed.signatures().iter().any(|sig| {
        sig.hint == hint && ed25519_verify(&public_key, signed.hash(), &sig.signature).is_ok()
    })
}

/// 1操作を適用する。失敗時はHorizonの操作結果コードを返す。
fn apply_operation(
    accounts: &mut HashMap<String, AccountState>,
    op: &Operation,
    tx_source: &str,
) -> Result<(), &'static str> {
    match op {
        Operation::ChangeTrust {
            source,
            asset,
            limit,
        } => {
            let holder = source.as_deref().unwrap_or(tx_source);
            if holder == asset.issuer() {
                return Err("op_malformed");
            }
            let account = accounts.get_mut(holder).ok_or("op_no_source_account")?;
            match account
                .balances
                .iter_mut()
                .find(|line| asset.matches_balance(line))
            {
                Some(line) => {
                    if parse_balance(&line.balance).unwrap_or(0) > *limit {
                        return Err("op_invalid_limit");
                    }
                    line.limit = Some(format_stroops(*limit));
                }
                None => account.balances.push(new_trustline(asset, *limit)),
            }
            Ok(())
        }
        Operation::Payment {
            source,
            destination,
            asset,
            amount,
        } => {
            let sender = source.as_deref().unwrap_or(tx_source);
            if !accounts.contains_key(sender) {
                return Err("op_no_source_account");
            }
            if !accounts.contains_key(destination.as_str()) {
                return Err("op_no_destination");
            }

            // 発行者以外からの送金は残高を減らす
            if sender != asset.issuer() {
                let account = accounts.get_mut(sender).ok_or("op_no_source_account")?;
                let line = account
                    .balances
                    .iter_mut()
                    .find(|line| asset.matches_balance(line))
                    .ok_or("op_src_no_trust")?;
                let balance = parse_balance(&line.balance).unwrap_or(0);
                if balance < *amount {
                    return Err("op_underfunded");
                }
                line.balance = format_stroops(balance - amount);
            }

            // 発行者への送金は焼却として扱う
            if destination.as_str() != asset.issuer() {
                let account = accounts
                    .get_mut(destination.as_str())
                    .ok_or("op_no_destination")?;
                let line = account
                    .balances
                    .iter_mut()
                    .find(|line| asset.matches_balance(line))
                    .ok_or("op_no_trust")?;
                let balance = parse_balance(&line.balance).unwrap_or(0);
                let limit = line
                    .limit
                    .as_deref()
                    .and_then(|l| parse_balance(l).ok())
                    .unwrap_or(i64::MAX);
                let updated = balance
                    .checked_add(*amount)
                    .filter(|b| *b <= limit)
                    .ok_or("op_line_full")?;
                line.balance = format_stroops(updated);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TransactionBuilder, DEFAULT_TIMEOUT_SECS};
    use tokenforge_crypto::{Keypair, TESTNET_PASSPHRASE};

    struct Fixture {
        ledger: MockLedger,
        issuer: Keypair,
        dest: Keypair,
        asset: AssetDescriptor,
    }

    fn fixture() -> Fixture {
        let issuer = Keypair::random();
        let dest = Keypair::random();
        let ledger = MockLedger::new(TESTNET_PASSPHRASE)
            .with_account(&issuer.account_id(), 100)
            .with_account(&dest.account_id(), 200);
        let asset = AssetDescriptor::new("USD", &issuer.account_id()).unwrap();
        Fixture {
            ledger,
            issuer,
            dest,
            asset,
        }
    }

    async fn issue_tx(f: &Fixture, with_trust: bool, amount: i64) -> SignedTransaction {
        let mut issuer_account = f.ledger.load_account(&f.issuer.account_id()).await.unwrap();
        let mut builder =
            TransactionBuilder::new(&mut issuer_account, BASE_FEE, TESTNET_PASSPHRASE);
        if with_trust {
            builder = builder.add_operation(Operation::change_trust(
                f.asset.clone(),
                Some(f.dest.account_id()),
            ));
        }
        let tx = builder
            .add_operation(Operation::payment(&f.dest.account_id(), f.asset.clone(), amount))
            .set_timeout(DEFAULT_TIMEOUT_SECS)
            .build()
            .unwrap();
        SignedTransaction::new(tx).unwrap()
    }

    #[tokio::test]
    async fn test_load_account_errors() {
        let f = fixture();
        assert!(matches!(
            f.ledger.load_account("DEST1").await,
            Err(LedgerError::InvalidAccountId(_))
        ));
        let unknown = Keypair::random().account_id();
        assert!(matches!(
            f.ledger.load_account(&unknown).await,
            Err(LedgerError::NotFound(_))
        ));
        f.ledger.set_unreachable(true);
        assert!(matches!(
            f.ledger.load_account(&f.issuer.account_id()).await,
            Err(LedgerError::Network(_))
        ));
        assert_eq!(f.ledger.load_calls(), 3);
    }

    #[tokio::test]
    async fn test_trust_and_payment_applied() {
        let f = fixture();
        let mut tx = issue_tx(&f, true, 500_000_000).await;
        tx.sign(&f.issuer).unwrap();
        tx.sign(&f.dest).unwrap();

        let response = f.ledger.submit_transaction(&tx).await.unwrap();
        assert_eq!(response.hash, tx.hash_hex());
        assert_eq!(
            f.ledger.balance(&f.dest.account_id(), &f.asset).as_deref(),
            Some("50.0000000")
        );
        assert_eq!(f.ledger.account(&f.issuer.account_id()).unwrap().sequence, 101);
    }

    #[tokio::test]
    async fn test_missing_destination_signature_is_bad_auth() {
        let f = fixture();
        let mut tx = issue_tx(&f, true, 1).await;
        tx.sign(&f.issuer).unwrap();

        match f.ledger.submit_transaction(&tx).await {
            Err(LedgerError::Rejected { result_codes }) => {
                assert_eq!(result_codes.transaction, "tx_bad_auth");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // 署名エラーではシーケンス番号を消費しない
        assert_eq!(f.ledger.account(&f.issuer.account_id()).unwrap().sequence, 100);
    }

    #[tokio::test]
    async fn test_payment_without_trustline_fails_operation() {
        let f = fixture();
        let mut tx = issue_tx(&f, false, 1).await;
        tx.sign(&f.issuer).unwrap();

        match f.ledger.submit_transaction(&tx).await {
            Err(LedgerError::Rejected { result_codes }) => {
                assert_eq!(result_codes.transaction, "tx_failed");
                assert_eq!(result_codes.operations, Some(vec!["op_no_trust".to_string()]));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(f.ledger.account(&f.issuer.account_id()).unwrap().sequence, 101);
    }

    #[tokio::test]
    async fn test_stale_sequence_is_bad_seq() {
        let f = fixture();
        let mut first = issue_tx(&f, true, 1).await;
        let mut second = issue_tx(&f, false, 1).await;
        first.sign(&f.issuer).unwrap();
        first.sign(&f.dest).unwrap();
        second.sign(&f.issuer).unwrap();

        assert!(f.ledger.submit_transaction(&first).await.is_ok());
        match f.ledger.submit_transaction(&second).await {
            Err(LedgerError::Rejected { result_codes }) => {
                assert_eq!(result_codes.transaction, "tx_bad_seq");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let f = fixture();
        let mut tx = issue_tx(&f, true, 1).await;
        tx.sign(&f.issuer).unwrap();
        tx.sign(&f.dest).unwrap();

        f.ledger
            .fail_next_submit(InjectedFailure::Transport("connection reset".to_string()));
        assert!(matches!(
            f.ledger.submit_transaction(&tx).await,
            Err(LedgerError::Transport(_))
        ));

        // 障害は1回のみ
        assert!(f.ledger.submit_transaction(&tx).await.is_ok());
        assert_eq!(f.ledger.submit_calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_network_is_bad_auth() {
        let f = fixture();
        let mainnet = MockLedger::new(tokenforge_crypto::PUBLIC_PASSPHRASE)
            .with_account(&f.issuer.account_id(), 100)
            .with_account(&f.dest.account_id(), 200);
        let mut tx = issue_tx(&f, true, 1).await;
        tx.sign(&f.issuer).unwrap();
        tx.sign(&f.dest).unwrap();

        match mainnet.submit_transaction(&tx).await {
            Err(LedgerError::Rejected { result_codes }) => {
                assert_eq!(result_codes.transaction, "tx_bad_auth");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_source_sequence_is_bad_seq() {
        let f = fixture();
        f.ledger.create_account(&f.issuer.account_id(), i64::MAX - 1);
        f.ledger.add_trustline(&f.dest.account_id(), &f.asset);
        let mut tx = issue_tx(&f, false, 1).await;
        tx.sign(&f.issuer).unwrap();
        assert_eq!(tx.transaction().sequence(), i64::MAX);

        // レジャー側のシーケンス番号が上限に達している
        f.ledger.create_account(&f.issuer.account_id(), i64::MAX);
        match f.ledger.submit_transaction(&tx).await {
            Err(LedgerError::Rejected { result_codes }) => {
                assert_eq!(result_codes.transaction, "tx_bad_seq");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submission_history_is_capped() {
        let f = fixture();
        let mut tx = issue_tx(&f, true, 1).await;
        tx.sign(&f.issuer).unwrap();

        let total = MAX_RECORDED_SUBMISSIONS + 5;
        for _ in 0..total {
            f.ledger
                .fail_next_submit(InjectedFailure::Transport("timeout".to_string()));
            assert!(f.ledger.submit_transaction(&tx).await.is_err());
        }

        assert_eq!(f.ledger.submit_calls(), total);
        assert_eq!(f.ledger.submitted().len(), MAX_RECORDED_SUBMISSIONS);
    }
}
