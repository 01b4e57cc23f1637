//! # アセット識別子
//!
//! 発行アセットは（アセットコード, 発行者アカウント）の組で一意に識別される。

use std::fmt;

use stellar_xdr::curr as xdr;
use tokenforge_crypto::{decode_account_id, CryptoError};
use tokenforge_types::BalanceLine;

/// アセットコードの最大長
pub const MAX_TOKEN_CODE_LEN: usize = 12;

/// `credit_alphanum4` として扱うコードの最大長
const ALPHANUM4_MAX_LEN: usize = 4;

/// アセット関連のエラー型
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// コード未指定（空白のみを含む）
    #[error("token code required")]
    MissingCode,
    /// `^[A-Za-z0-9]{1,12}$` に一致しない
    #[error("invalid token code format")]
    InvalidCode,
    /// 発行者がアカウントIDとして不正
    #[error("invalid issuer account: {0}")]
    InvalidIssuer(#[from] CryptoError),
}

/// アセットコードを検証する。
///
/// 空白のみの値は未指定として扱い、それ以外は `^[A-Za-z0-9]{1,12}$` で判定する。
pub fn validate_token_code(code: &str) -> Result<(), AssetError> {
    if code.trim().is_empty() {
        return Err(AssetError::MissingCode);
    }
    if code.len() > MAX_TOKEN_CODE_LEN || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(AssetError::InvalidCode);
    }
    Ok(())
}

/// 発行アセットの識別子（コード, 発行者）。構築後は不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    code: String,
    issuer: String,
    issuer_key: [u8; 32],
}

impl AssetDescriptor {
    /// コードと発行者アカウントIDから構築する。
    pub fn new(code: &str, issuer: &str) -> Result<Self, AssetError> {
        validate_token_code(code)?;
        let issuer_key = decode_account_id(issuer)?;
        Ok(Self {
            code: code.to_string(),
            issuer: issuer.to_string(),
            issuer_key,
        })
    }

    /// アセットコード
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 発行者アカウントID
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Horizonの `asset_type` 表記
    pub fn asset_type(&self) -> &'static str {
        if self.code.len() <= ALPHANUM4_MAX_LEN {
            "credit_alphanum4"
        } else {
            "credit_alphanum12"
        }
    }

    /// 残高行がこのアセットのtrustlineか判定する。コードと発行者の両方が一致する必要がある。
    pub fn matches_balance(&self, line: &BalanceLine) -> bool {
        line.asset_code.as_deref() == Some(self.code.as_str())
            && line.asset_issuer.as_deref() == Some(self.issuer.as_str())
    }

    /// XDR `Asset`
    pub(crate) fn to_xdr_asset(&self) -> xdr::Asset {
        if self.code.len() <= ALPHANUM4_MAX_LEN {
            xdr::Asset::CreditAlphanum4(self.alphanum4())
        } else {
            xdr::Asset::CreditAlphanum12(self.alphanum12())
        }
    }

    /// XDR `ChangeTrustAsset`（`Asset` と同一表現）
    pub(crate) fn to_change_trust_asset(&self) -> xdr::ChangeTrustAsset {
        if self.code.len() <= ALPHANUM4_MAX_LEN {
            xdr::ChangeTrustAsset::CreditAlphanum4(self.alphanum4())
        } else {
            xdr::ChangeTrustAsset::CreditAlphanum12(self.alphanum12())
        }
    }

    fn alphanum4(&self) -> xdr::AlphaNum4 {
        let mut code = [0u8; ALPHANUM4_MAX_LEN];
        code[..self.code.len()].copy_from_slice(self.code.as_bytes());
        xdr::AlphaNum4 {
            asset_code: xdr::AssetCode4(code),
            issuer: self.issuer_account(),
        }
    }

    fn alphanum12(&self) -> xdr::AlphaNum12 {
        let mut code = [0u8; MAX_TOKEN_CODE_LEN];
        code[..self.code.len()].copy_from_slice(self.code.as_bytes());
        xdr::AlphaNum12 {
            asset_code: xdr::AssetCode12(code),
            issuer: self.issuer_account(),
        }
    }

    fn issuer_account(&self) -> xdr::AccountId {
        xdr::AccountId(xdr::PublicKey::PublicKeyTypeEd25519(xdr::Uint256(
            self.issuer_key,
        )))
    }
}

impl fmt::Display for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_xdr::curr::{Limits, ReadXdr, WriteXdr};
    use tokenforge_crypto::Keypair;

    fn line(code: &str, issuer: &str) -> BalanceLine {
        BalanceLine {
            balance: "0.0000000".to_string(),
            asset_type: "credit_alphanum4".to_string(),
            asset_code: Some(code.to_string()),
            asset_issuer: Some(issuer.to_string()),
            limit: None,
        }
    }

    #[test]
    fn test_validate_token_code() {
        assert!(validate_token_code("USD").is_ok());
        assert!(validate_token_code("a").is_ok());
        assert!(validate_token_code("ABCDEFGHIJ12").is_ok());

        assert!(matches!(validate_token_code(""), Err(AssetError::MissingCode)));
        assert!(matches!(validate_token_code("   "), Err(AssetError::MissingCode)));
        assert!(matches!(validate_token_code("ABCDEFGHIJ123"), Err(AssetError::InvalidCode)));
        assert!(matches!(validate_token_code("US-D"), Err(AssetError::InvalidCode)));
        assert!(matches!(validate_token_code(" USD"), Err(AssetError::InvalidCode)));
        assert!(matches!(validate_token_code("ÜSD"), Err(AssetError::InvalidCode)));
    }

    #[test]
    fn test_display_and_type() {
        let issuer = Keypair::random().account_id();
        let short = AssetDescriptor::new("USD", &issuer).unwrap();
        let long = AssetDescriptor::new("GOLDTOKEN", &issuer).unwrap();
        assert_eq!(short.to_string(), format!("USD:{issuer}"));
        assert_eq!(short.asset_type(), "credit_alphanum4");
        assert_eq!(long.asset_type(), "credit_alphanum12");
    }

    #[test]
    fn test_rejects_invalid_issuer() {
        assert!(matches!(
            AssetDescriptor::new("USD", "ISS1"),
            Err(AssetError::InvalidIssuer(_))
        ));
    }

    #[test]
    fn test_matches_balance_requires_code_and_issuer() {
        let issuer = Keypair::random().account_id();
        let other = Keypair::random().account_id();
        let asset = AssetDescriptor::new("USD", &issuer).unwrap();

        assert!(asset.matches_balance(&line("USD", &issuer)));
        assert!(!asset.matches_balance(&line("USD", &other)));
        assert!(!asset.matches_balance(&line("EUR", &issuer)));
    }

    #[test]
    fn test_xdr_alphanum4_roundtrip() {
        let kp = Keypair::random();
        let asset = AssetDescriptor::new("USD", &kp.account_id()).unwrap();
        let encoded = asset.to_xdr_asset();
        let bytes = encoded.to_xdr(Limits::none()).unwrap();

        // type(4) + code(4) + key type(4) + key(32)
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[4..8], b"USD\0");
        assert_eq!(xdr::Asset::from_xdr(&bytes, Limits::none()).unwrap(), encoded);

        let xdr::Asset::CreditAlphanum4(alphanum) = encoded else {
            panic!("expected credit_alphanum4");
        };
        assert_eq!(
            alphanum.issuer,
            xdr::AccountId(xdr::PublicKey::PublicKeyTypeEd25519(xdr::Uint256(
                kp.public_key_bytes()
            )))
        );
    }

    #[test]
    fn test_xdr_alphanum12_roundtrip() {
        let kp = Keypair::random();
        let asset = AssetDescriptor::new("GOLDTOKEN", &kp.account_id()).unwrap();
        let line = asset.to_change_trust_asset();
        let bytes = line.to_xdr(Limits::none()).unwrap();

        assert_eq!(bytes.len(), 52);
        assert_eq!(
            xdr::ChangeTrustAsset::from_xdr(&bytes, Limits::none()).unwrap(),
            line
        );
        match line {
            xdr::ChangeTrustAsset::CreditAlphanum12(alphanum) => {
                assert_eq!(&alphanum.asset_code.0, b"GOLDTOKEN\0\0\0");
            }
            other => panic!("expected credit_alphanum12: {other:?}"),
        }
        // ChangeTrustAsset と Asset は同じバイト列になる
        assert_eq!(asset.to_xdr_asset().to_xdr(Limits::none()).unwrap(), bytes);
    }
}
