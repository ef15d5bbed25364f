use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Allocation, AllocationStore, StoreError};
use crate::address::WalletAddress;
use crate::amount::TokenAmount;

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    map: DashMap<WalletAddress, TokenAmount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AllocationStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn put(&self, address: &WalletAddress, amount: &TokenAmount) -> Result<(), StoreError> {
        self.map.insert(address.clone(), amount.clone());
        Ok(())
    }

    fn get(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        Ok(self.map.get(address).map(|v| v.value().clone()))
    }

    fn remove(&self, address: &WalletAddress) -> Result<(), StoreError> {
        self.map.remove(address);
        Ok(())
    }

    fn take(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        // remove holds the shard write lock for the whole lookup+delete
        Ok(self.map.remove(address).map(|(_, v)| v))
    }

    fn put_if_absent(
        &self,
        address: &WalletAddress,
        amount: &TokenAmount,
    ) -> Result<bool, StoreError> {
        match self.map.entry(address.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(v) => {
                v.insert(amount.clone());
                Ok(true)
            }
        }
    }

    fn entries(&self) -> Result<Vec<Allocation>, StoreError> {
        let mut out: Vec<Allocation> = self
            .map
            .iter()
            .map(|e| Allocation {
                address: e.key().clone(),
                amount: e.value().clone(),
            })
            .collect();
        out.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(out)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.map.len())
    }
}
