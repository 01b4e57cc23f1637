//! # StrKey エンコーディング
//!
//! Stellar のアカウントID（`G...`）とシード（`S...`）の文字列表現。
//! エンコード・デコードは `stellar-strkey` に委譲する。

use stellar_strkey::ed25519;

use crate::CryptoError;

/// 32バイト鍵のStrKey文字列長
pub const ED25519_STRKEY_LEN: usize = 56;

/// 公開鍵をアカウントID（`G...`）にエンコードする。
pub fn encode_account_id(public_key: &[u8; 32]) -> String {
    ed25519::PublicKey(*public_key).to_string()
}

/// シードを `S...` 形式にエンコードする。
pub fn encode_secret_seed(seed: &[u8; 32]) -> String {
    ed25519::PrivateKey(*seed).to_string()
}

/// アカウントID（`G...`）をデコードする。
pub fn decode_account_id(account_id: &str) -> Result<[u8; 32], CryptoError> {
    ed25519::PublicKey::from_string(account_id)
        .map(|key| key.0)
        .map_err(|e| CryptoError::InvalidStrKey(format!("アカウントIDとして不正です: {e:?}")))
}

/// シード（`S...`）をデコードする。エラーにシード文字列は含めない。
pub fn decode_secret_seed(seed: &str) -> Result<[u8; 32], CryptoError> {
    ed25519::PrivateKey::from_string(seed)
        .map(|key| key.0)
        .map_err(|e| CryptoError::InvalidStrKey(format!("シードとして不正です: {e:?}")))
}

/// アカウントIDとして有効か
pub fn is_valid_account_id(account_id: &str) -> bool {
    decode_account_id(account_id).is_ok()
}
