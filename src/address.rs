//! Wallet address handling
//!
//! Addresses are accepted in any case and normalized to lowercase hex so the
//! store, the chain client and the API all agree on one key per wallet.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a `0x`-prefixed 20-byte hex address.
pub const ADDRESS_LEN: usize = 42;

/// The all-zero address, treated as "not configured" for contract addresses.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid wallet address: {0:?}")]
pub struct InvalidAddress(pub String);

/// A validated EVM wallet address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize an address matching `^0x[0-9a-fA-F]{40}$`.
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        if !is_valid_address(raw) {
            return Err(InvalidAddress(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20 address bytes.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // validated on construction, so decoding cannot fail
        if let Ok(v) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&v);
        }
        out
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// EIP-55 mixed-case rendering, for display and logs.
    pub fn to_checksum(&self) -> String {
        Address::from(self.to_bytes()).to_checksum(None)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }
}

/// Format check shared by every entry point: `0x` prefix and 40 hex digits.
pub fn is_valid_address(s: &str) -> bool {
    if s.len() != ADDRESS_LEN || !s.starts_with("0x") {
        return false;
    }
    s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
