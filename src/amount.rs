//! Decimal token amounts
//!
//! Amounts travel as decimal strings end to end and are only converted to
//! integer base units (amount * 10^decimals) when a transaction is built.

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is not a non-negative decimal number: {0:?}")]
    NotANumber(String),
    #[error("amount {amount} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("amount {0} does not fit in 256 bits")]
    Overflow(String),
}

/// A non-negative decimal amount of whole tokens, e.g. `"100"` or `"0.25"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenAmount(String);

impl TokenAmount {
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (int, frac) = match s.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (s, None),
        };
        let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !digits(int) || frac.is_some_and(|f| !digits(f)) {
            return Err(AmountError::NotANumber(raw.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to integer base units for a token with `decimals` places.
    pub fn to_base_units(&self, decimals: u8) -> Result<U256, AmountError> {
        let (int, frac) = self.0.split_once('.').unwrap_or((&self.0, ""));
        let frac = frac.trim_end_matches('0');
        if frac.len() > decimals as usize {
            return Err(AmountError::TooPrecise {
                amount: self.0.clone(),
                decimals,
            });
        }
        let mut joined = String::with_capacity(int.len() + decimals as usize);
        joined.push_str(int);
        joined.push_str(frac);
        joined.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));

        U256::from_str_radix(&joined, 10).map_err(|_| AmountError::Overflow(self.0.clone()))
    }

    /// Render base units back into a trimmed decimal string.
    pub fn from_base_units(units: U256, decimals: u8) -> Self {
        Self(format_units(units, decimals))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0' || b == b'.')
    }
}

/// `123450000000000000000` with 18 decimals renders as `"123.45"`.
pub fn format_units(units: U256, decimals: u8) -> String {
    let raw = units.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }
    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int, frac) = padded.split_at(padded.len() - decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
