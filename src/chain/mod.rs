//! EVM chain access: JSON-RPC transport, ABI helpers, the admin signer and the
//! token / claim-list contract bindings.

pub mod abi;
pub mod errors;
pub mod gateway;
#[cfg(test)]
pub(crate) mod mock;
pub mod rpc;
pub mod signer;

use thiserror::Error;

pub use gateway::{ClaimStatus, EvmTokenGateway, TokenGateway, TokenInfo, TxHash};
pub use rpc::RpcClient;
pub use signer::AdminSigner;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to decode chain response: {0}")]
    Decode(String),
    #[error("admin signing key not configured")]
    SignerMissing,
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("transaction {0} reverted")]
    Reverted(String),
    /// The node may have accepted the transaction but no receipt was seen.
    /// It must be treated as sent.
    #[error("transaction {hash} submitted but not confirmed: {reason}")]
    Unconfirmed { hash: TxHash, reason: String },
    #[error("{0}")]
    Rejected(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    /// Message suitable for end users, rewording well-known node errors.
    pub fn friendly(&self) -> String {
        match self {
            ChainError::Unconfirmed { hash, .. } => {
                format!("Transaction {hash} submitted, confirmation pending")
            }
            other => errors::friendly_message(&other.to_string()),
        }
    }

    /// Hash of a transaction whose outcome is unknown, if that is what failed.
    pub fn unconfirmed_tx(&self) -> Option<&str> {
        match self {
            ChainError::Unconfirmed { hash, .. } => Some(hash),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Transport(e.to_string())
    }
}
