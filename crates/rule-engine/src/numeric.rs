//! 任意精度整数
//!
//! 链上数量（wei、代币数量、token id、交易数）在内部统一使用 256 位整数，
//! 在 JSON 边界上一律以十进制字符串表示，不经过浮点数。

use alloy_primitives::{I256, U256};
use std::cmp::Ordering;
use std::fmt;

/// 校验字符串是否为十进制无符号整数（仅包含 ASCII 数字，且不超过 256 位）
pub fn parse_decimal(s: &str) -> Option<U256> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

/// 合约调用返回的整数，区分无符号（uint*）与有符号（int*）
#[derive(Debug, Clone, Copy)]
pub enum Integer {
    Unsigned(U256),
    Signed(I256),
}

impl Integer {
    /// 解析十进制整数，允许负号前缀
    pub fn parse(s: &str) -> Option<Self> {
        match s.strip_prefix('-') {
            Some(digits) => {
                parse_decimal(digits)?;
                I256::from_dec_str(s).ok().map(Self::Signed)
            }
            None => parse_decimal(s).map(Self::Unsigned),
        }
    }
}

impl From<U256> for Integer {
    fn from(value: U256) -> Self {
        Self::Unsigned(value)
    }
}

impl From<I256> for Integer {
    fn from(value: I256) -> Self {
        Self::Signed(value)
    }
}

impl From<u64> for Integer {
    fn from(value: u64) -> Self {
        Self::Unsigned(U256::from(value))
    }
}

impl Ord for Integer {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Unsigned(a), Self::Unsigned(b)) => a.cmp(b),
            (Self::Signed(a), Self::Signed(b)) => a.cmp(b),
            (Self::Signed(a), Self::Unsigned(b)) => signed_cmp_unsigned(a, b),
            (Self::Unsigned(a), Self::Signed(b)) => signed_cmp_unsigned(b, a).reverse(),
        }
    }
}

impl PartialEq for Integer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Integer {}

impl PartialOrd for Integer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// 非负的 I256 其补码表示与数值相同
fn signed_cmp_unsigned(signed: &I256, unsigned: &U256) -> Ordering {
    if signed.is_negative() {
        Ordering::Less
    } else {
        signed.into_raw().cmp(unsigned)
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
        }
    }
}

/// `U256` 与十进制字符串之间的 serde 适配
///
/// 用法：`#[serde(with = "crate::numeric::decimal")]`
pub mod decimal {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_decimal(&s)
            .ok_or_else(|| D::Error::custom(format!("无效的十进制整数字符串: '{s}'")))
    }
}
