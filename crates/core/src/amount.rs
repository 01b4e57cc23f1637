//! # 金額表現
//!
//! Stellar の金額は int64 の stroop（1単位 = 10^7 stroop）で表す。
//! API では小数点表記の文字列で受け渡す。

/// 1単位あたりのstroop数
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// 小数部の最大桁数
pub const MAX_DECIMALS: usize = 7;

/// 金額のパースエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// 空文字列
    #[error("amount is empty")]
    Empty,
    /// 数字と小数点以外を含む
    #[error("amount is not a decimal number: {0:?}")]
    Malformed(String),
    /// 小数部が7桁を超える
    #[error("amount has more than {MAX_DECIMALS} decimal places")]
    TooPrecise,
    /// 0以下
    #[error("amount must be positive")]
    NotPositive,
    /// int64に収まらない
    #[error("amount exceeds the maximum representable value")]
    Overflow,
}

/// 発行量をstroopにパースする。0は許可しない。
pub fn parse_amount(s: &str) -> Result<i64, AmountError> {
    let stroops = parse_stroops(s)?;
    if stroops == 0 {
        return Err(AmountError::NotPositive);
    }
    Ok(stroops)
}

/// 残高をstroopにパースする。0を許可する。
pub fn parse_balance(s: &str) -> Result<i64, AmountError> {
    parse_stroops(s)
}

/// stroopを7桁固定の小数点表記に変換する（Horizonの残高表記と同じ形式）。
pub fn format_stroops(stroops: i64) -> String {
    let sign = if stroops < 0 { "-" } else { "" };
    let abs = stroops.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u64;
    format!("{sign}{}.{:07}", abs / unit, abs % unit)
}

fn parse_stroops(s: &str) -> Result<i64, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::NotPositive);
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !digits_only(int_part)
        || !digits_only(frac_part)
    {
        return Err(AmountError::Malformed(s.to_string()));
    }
    if frac_part.len() > MAX_DECIMALS {
        return Err(AmountError::TooPrecise);
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac: i64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{frac_part:0<width$}", width = MAX_DECIMALS);
        padded
            .parse()
            .map_err(|_| AmountError::Malformed(s.to_string()))?
    };

    whole
        .checked_mul(STROOPS_PER_UNIT)
        .and_then(|v| v.checked_add(frac))
        .ok_or(AmountError::Overflow)
}
