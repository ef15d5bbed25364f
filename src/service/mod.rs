//! Business actions shared by every entry point: admin distribution,
//! self-service claims and the claim-list contract operations.

pub mod claim;
pub mod claim_list;
pub mod distribute;

use thiserror::Error;

use crate::address::InvalidAddress;
use crate::amount::AmountError;
use crate::chain::ChainError;
use crate::store::StoreError;

pub use claim::{claim_tokens, ClaimReceipt, ClaimRequest};
pub use distribute::{distribute, DistributeOutcome, DistributeRequest, TransferResult};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected input; nothing was changed.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidAddress(_) => ServiceError::invalid_address(),
            StoreError::InvalidAmount(a) => ServiceError::Validation(format!("Invalid amount: {a}")),
            other => ServiceError::Store(other),
        }
    }
}

impl From<InvalidAddress> for ServiceError {
    fn from(_: InvalidAddress) -> Self {
        ServiceError::invalid_address()
    }
}

impl From<AmountError> for ServiceError {
    fn from(e: AmountError) -> Self {
        ServiceError::Validation(format!("Invalid amount: {e}"))
    }
}

impl ServiceError {
    pub fn invalid_address() -> Self {
        ServiceError::Validation("Invalid wallet address".into())
    }

    /// Text for the `{ "error": .. }` body.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Chain(e) => e.friendly(),
            ServiceError::Store(_) => "Allocation storage error".to_string(),
            other => other.to_string(),
        }
    }
}
