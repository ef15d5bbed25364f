//! Admin authorization and wallet claim proofs.
//!
//! Admin routes accept either a `personal_sign` signature from the admin wallet
//! over a timestamped message, or a shared bearer token. Handlers only ever see
//! the resulting [`AdminIdentity`].

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use thiserror::Error;

use crate::address::WalletAddress;
use crate::chain::signer::recover_message_signer;

pub const SIGNATURE_HEADER: &str = "x-admin-signature";
pub const TIMESTAMP_HEADER: &str = "x-admin-timestamp";
pub const TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("malformed credentials: {0}")]
    Malformed(String),
    #[error("timestamp outside the allowed window")]
    Stale,
    #[error("signature from {0} is not authorized")]
    WrongSigner(String),
    #[error("invalid admin token")]
    BadToken,
}

/// Who passed the admin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminIdentity {
    Wallet(WalletAddress),
    Token,
}

impl AdminIdentity {
    pub fn label(&self) -> String {
        match self {
            AdminIdentity::Wallet(a) => a.to_checksum(),
            AdminIdentity::Token => "bearer-token".to_string(),
        }
    }
}

pub trait AdminAuthenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError>;
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn admin_message(timestamp: u64) -> String {
    format!("Web3D admin authorization {timestamp}")
}

pub fn claim_message(address: &WalletAddress, timestamp: u64) -> String {
    format!("Claim Web3D tokens for {address} at {timestamp}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn check_fresh(timestamp: u64, now: u64, max_skew_secs: u64) -> Result<(), AuthError> {
    if timestamp.abs_diff(now) > max_skew_secs {
        return Err(AuthError::Stale);
    }
    Ok(())
}

fn decode_signature(raw: &str) -> Result<Vec<u8>, AuthError> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| AuthError::Malformed(format!("signature: {e}")))
}

/// Recover the signer of `message` and require it to be `expected`.
fn verify_signed(
    message: &str,
    signature: &str,
    expected: &WalletAddress,
) -> Result<WalletAddress, AuthError> {
    let sig = decode_signature(signature)?;
    let signer =
        recover_message_signer(message, &sig).map_err(|e| AuthError::Malformed(e.to_string()))?;
    if &signer != expected {
        return Err(AuthError::WrongSigner(signer.to_checksum()));
    }
    Ok(signer)
}

/// Signature from the admin wallet over `"Web3D admin authorization {ts}"`.
pub struct SignedMessageAuth {
    admin: WalletAddress,
    max_skew_secs: u64,
}

impl SignedMessageAuth {
    pub fn new(admin: WalletAddress, max_skew_secs: u64) -> Self {
        Self {
            admin,
            max_skew_secs,
        }
    }

    pub fn verify_at(&self, headers: &HeaderMap, now: u64) -> Result<AdminIdentity, AuthError> {
        let signature = header_str(headers, SIGNATURE_HEADER).ok_or(AuthError::Missing)?;
        let timestamp = header_str(headers, TIMESTAMP_HEADER)
            .ok_or(AuthError::Missing)?
            .parse::<u64>()
            .map_err(|_| AuthError::Malformed("timestamp".into()))?;
        check_fresh(timestamp, now, self.max_skew_secs)?;
        let signer = verify_signed(&admin_message(timestamp), signature, &self.admin)?;
        Ok(AdminIdentity::Wallet(signer))
    }
}

impl AdminAuthenticator for SignedMessageAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError> {
        self.verify_at(headers, unix_now())
    }
}

/// `Authorization: Bearer <token>` or `x-admin-token: <token>`.
pub struct BearerTokenAuth {
    token: String,
}

impl BearerTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AdminAuthenticator for BearerTokenAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError> {
        let presented = header_str(headers, "authorization")
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .or_else(|| header_str(headers, TOKEN_HEADER))
            .ok_or(AuthError::Missing)?;
        if tokens_match(presented.as_bytes(), self.token.as_bytes()) {
            Ok(AdminIdentity::Token)
        } else {
            Err(AuthError::BadToken)
        }
    }
}

// Compares every byte regardless of where the first mismatch is.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Tries each authenticator in order; the first success wins.
#[derive(Default)]
pub struct AuthChain {
    members: Vec<Box<dyn AdminAuthenticator>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, auth: impl AdminAuthenticator + 'static) -> Self {
        self.members.push(Box::new(auth));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl AdminAuthenticator for AuthChain {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AdminIdentity, AuthError> {
        let mut last = AuthError::Missing;
        for member in &self.members {
            match member.authenticate(headers) {
                Ok(identity) => return Ok(identity),
                // keep the most specific failure for the log line
                Err(AuthError::Missing) => {}
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

/// Proof that the caller controls `address`, for self-service claims.
pub fn verify_claim_proof(
    address: &WalletAddress,
    signature: &str,
    timestamp: u64,
    now: u64,
    max_skew_secs: u64,
) -> Result<(), AuthError> {
    check_fresh(timestamp, now, max_skew_secs)?;
    verify_signed(&claim_message(address, timestamp), signature, address).map(|_| ())
}
