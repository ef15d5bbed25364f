// Allocation store: wallet -> pending claim amount
//
// One allocation per lowercase address. Setting overwrites, claiming deletes.
// Every backend must implement `take` as a single atomic compare-and-delete so
// two concurrent claims for the same wallet cannot both succeed.

pub mod json_file;
pub mod memory;
pub mod sled_store;

use serde::Serialize;
use thiserror::Error;

use crate::address::{InvalidAddress, WalletAddress};
use crate::amount::{AmountError, TokenAmount};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid wallet address")]
    InvalidAddress(#[from] InvalidAddress),
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("storage: {0}")]
    Storage(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

/// One row of the store, as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub address: WalletAddress,
    pub amount: TokenAmount,
}

pub trait AllocationStore: Send + Sync {
    /// Backend label for health output.
    fn kind(&self) -> &'static str;

    /// Insert or overwrite.
    fn put(&self, address: &WalletAddress, amount: &TokenAmount) -> Result<(), StoreError>;

    fn get(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError>;

    /// Remove without returning; removing an absent key is not an error.
    fn remove(&self, address: &WalletAddress) -> Result<(), StoreError>;

    /// Atomically remove and return the allocation, if present.
    fn take(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError>;

    /// Insert only when no allocation exists. Returns whether it was inserted.
    fn put_if_absent(&self, address: &WalletAddress, amount: &TokenAmount)
        -> Result<bool, StoreError>;

    /// All allocations, sorted by address.
    fn entries(&self) -> Result<Vec<Allocation>, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries()?.len())
    }

    // ---- validating entry points used by the services ----

    /// Validate both inputs, then store under the lowercased address.
    fn set_allocation(&self, address: &str, amount: &str) -> Result<WalletAddress, StoreError> {
        let address = WalletAddress::parse(address)?;
        let amount = TokenAmount::parse(amount)?;
        self.put(&address, &amount)?;
        tracing::debug!(address = %address, amount = %amount, "allocation set");
        Ok(address)
    }

    /// Case-insensitive lookup.
    fn get_allocation(&self, address: &str) -> Result<Option<TokenAmount>, StoreError> {
        let address = WalletAddress::parse(address)?;
        self.get(&address)
    }

    /// Idempotent removal.
    fn clear_allocation(&self, address: &str) -> Result<(), StoreError> {
        let address = WalletAddress::parse(address)?;
        self.remove(&address)
    }

    /// Claim-if-present primitive.
    fn take_allocation(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        self.take(address)
    }

    /// Put back an allocation taken by a claim whose transfer failed,
    /// unless a newer allocation has been written meanwhile.
    fn restore_allocation(
        &self,
        address: &WalletAddress,
        amount: &TokenAmount,
    ) -> Result<bool, StoreError> {
        self.put_if_absent(address, amount)
    }

    fn list_allocations(&self) -> Result<Vec<Allocation>, StoreError> {
        self.entries()
    }
}
