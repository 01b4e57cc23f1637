//! # Tokenforge 暗号処理
//!
//! Stellar ネットワークでの署名に必要なプリミティブを提供する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | Ed25519 |
//! | ハッシュ / ネットワークID | SHA-256 |
//! | 鍵の文字列表現 | StrKey（`stellar-strkey`） |

pub mod strkey;

use std::fmt;

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha256};

pub use ed25519_dalek::{Signature as Ed25519Signature, SigningKey as Ed25519SigningKey};

/// テストネットのネットワークパスフレーズ
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// メインネットのネットワークパスフレーズ
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// StrKeyのデコードに失敗
    #[error("StrKeyのデコードに失敗しました: {0}")]
    InvalidStrKey(String),
    /// 公開鍵としてのデコードに失敗
    #[error("Ed25519公開鍵として不正です")]
    InvalidPublicKey,
    /// Ed25519署名検証エラー
    #[error("Ed25519署名検証に失敗しました")]
    SignatureVerifyError,
}

/// Stellar アカウントの Ed25519 キーペア。
///
/// `Debug` はアカウントIDのみを出力し、シードは出力しない。
pub struct Keypair {
    signing_key: Ed25519SigningKey,
}

impl Keypair {
    /// StrKeyシード（`S...`）からキーペアを復元する。
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        let seed = strkey::decode_secret_seed(secret.trim())?;
        Ok(Self::from_seed_bytes(&seed))
    }

    /// 32バイトのシードからキーペアを構築する。
    pub fn from_seed_bytes(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: Ed25519SigningKey::from_bytes(seed),
        }
    }

    /// OSの乱数源からキーペアを生成する。
    pub fn random() -> Self {
        Self {
            signing_key: Ed25519SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// 公開鍵（32バイト）
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// アカウントID（`G...`）
    pub fn account_id(&self) -> String {
        strkey::encode_account_id(&self.public_key_bytes())
    }

    /// シード（`S...`）。鍵生成コマンドの出力以外で使用しないこと。
    pub fn secret_seed(&self) -> String {
        strkey::encode_secret_seed(&self.signing_key.to_bytes())
    }

    /// 署名ヒント（公開鍵の末尾4バイト）
    pub fn signature_hint(&self) -> [u8; 4] {
        signature_hint(&self.public_key_bytes())
    }

    /// メッセージに署名する。
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}

/// アカウントID（`G...`）を公開鍵バイト列にデコードする。
pub fn decode_account_id(account_id: &str) -> Result<[u8; 32], CryptoError> {
    strkey::decode_account_id(account_id)
}

/// 公開鍵の末尾4バイト。DecoratedSignatureのヒントに使用する。
pub fn signature_hint(public_key: &[u8; 32]) -> [u8; 4] {
    let mut hint = [0u8; 4];
    hint.copy_from_slice(&public_key[28..]);
    hint
}

/// Ed25519による署名検証。
pub fn ed25519_verify(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), CryptoError> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(public_key)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = Ed25519Signature::from_bytes(signature);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerifyError)
}

/// SHA-256ハッシュ計算。
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// ネットワークID。`SHA-256(network_passphrase)`
pub fn network_id(passphrase: &str) -> [u8; 32] {
    sha256(passphrase.as_bytes())
}

/// ハッシュを小文字hexで表現する（Horizonのトランザクションハッシュ形式）。
pub fn hash_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_secret_roundtrip() {
        let kp = Keypair::random();
        let restored = Keypair::from_secret(&kp.secret_seed()).unwrap();
        assert_eq!(kp.account_id(), restored.account_id());
        assert!(kp.account_id().starts_with('G'));
        assert!(kp.secret_seed().starts_with('S'));
    }

    #[test]
    fn test_from_secret_rejects_account_id() {
        let kp = Keypair::random();
        assert!(Keypair::from_secret(&kp.account_id()).is_err());
        assert!(Keypair::from_secret("not-a-seed").is_err());
    }

    #[test]
    fn test_debug_hides_seed() {
        let kp = Keypair::random();
        let debug = format!("{kp:?}");
        assert!(debug.contains(&kp.account_id()));
        assert!(!debug.contains(&kp.secret_seed()));
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::random();
        let message = b"tokenforge";
        let sig = kp.sign(message);
        assert!(ed25519_verify(&kp.public_key_bytes(), message, &sig).is_ok());
        assert!(ed25519_verify(&kp.public_key_bytes(), b"other", &sig).is_err());

        let other = Keypair::random();
        assert!(ed25519_verify(&other.public_key_bytes(), message, &sig).is_err());
    }

    #[test]
    fn test_signature_hint_is_key_suffix() {
        let kp = Keypair::random();
        assert_eq!(kp.signature_hint(), kp.public_key_bytes()[28..32]);
    }

    #[test]
    fn test_decode_account_id() {
        let kp = Keypair::random();
        assert_eq!(decode_account_id(&kp.account_id()).unwrap(), kp.public_key_bytes());
        assert!(decode_account_id(&kp.secret_seed()).is_err());
    }

    #[test]
    fn test_network_id_differs_per_network() {
        assert_ne!(network_id(TESTNET_PASSPHRASE), network_id(PUBLIC_PASSPHRASE));
        assert_eq!(network_id(TESTNET_PASSPHRASE), sha256(TESTNET_PASSPHRASE.as_bytes()));
    }
}
