//! Minimal Solidity ABI encoding for the handful of calls we make.
//!
//! Static arguments are 32-byte words; dynamic arrays are referenced from the
//! head by byte offset and laid out as `length || items` in the tail.

use alloy_primitives::{keccak256, U256};

use super::ChainError;
use crate::address::WalletAddress;

pub const WORD: usize = 32;

/// First four bytes of keccak256 of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

pub fn address_word(address: &WalletAddress) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

pub fn uint_word(value: U256) -> [u8; WORD] {
    value.to_be_bytes::<WORD>()
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value as u64))
}

/// Calldata for a function taking no arguments.
pub fn encode_call0(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

/// Calldata for `f(address)`.
pub fn encode_call_address(signature: &str, address: &WalletAddress) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&address_word(address));
    data
}

/// Calldata for `f(address,uint256)`.
pub fn encode_call_address_uint(signature: &str, address: &WalletAddress, value: U256) -> Vec<u8> {
    let mut data = encode_call_address(signature, address);
    data.extend_from_slice(&uint_word(value));
    data
}

/// Calldata for `f(address[],uint256[])`.
pub fn encode_call_address_array_uint_array(
    signature: &str,
    addresses: &[WalletAddress],
    values: &[U256],
) -> Vec<u8> {
    let mut data = selector(signature).to_vec();

    let first_offset = 2 * WORD;
    let second_offset = first_offset + WORD * (1 + addresses.len());
    data.extend_from_slice(&usize_word(first_offset));
    data.extend_from_slice(&usize_word(second_offset));

    data.extend_from_slice(&usize_word(addresses.len()));
    for a in addresses {
        data.extend_from_slice(&address_word(a));
    }
    data.extend_from_slice(&usize_word(values.len()));
    for v in values {
        data.extend_from_slice(&uint_word(*v));
    }
    data
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * WORD;
    data.get(start..start + WORD)
        .ok_or_else(|| ChainError::Decode(format!("return data too short: {} bytes", data.len())))
}

pub fn decode_uint(data: &[u8]) -> Result<U256, ChainError> {
    Ok(U256::from_be_slice(word_at(data, 0)?))
}

pub fn decode_bool(data: &[u8]) -> Result<bool, ChainError> {
    let word = word_at(data, 0)?;
    Ok(word.iter().any(|b| *b != 0))
}

pub fn decode_address(data: &[u8]) -> Result<WalletAddress, ChainError> {
    let word = word_at(data, 0)?;
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(WalletAddress::from_bytes(bytes))
}

/// Decode a single dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, ChainError> {
    let offset = word_to_usize(word_at(data, 0)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| ChainError::Decode("string offset out of range".into()))?;
    let len_word = data
        .get(offset..start)
        .ok_or_else(|| ChainError::Decode("string length out of range".into()))?;
    let len = word_to_usize(len_word)?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| ChainError::Decode("string length out of range".into()))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| ChainError::Decode("string body out of range".into()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| ChainError::Decode(e.to_string()))
}

fn word_to_usize(word: &[u8]) -> Result<usize, ChainError> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("offset does not fit in usize".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| ChainError::Decode("offset does not fit in usize".into()))
}
