// Sled-backed allocation store
//
// Storage format:
//   Tree: "allocations"
//   Key: lowercase address bytes ("0xabc...")
//   Value: UTF-8 decimal amount ("100", "0.25")

use std::path::Path;

use sled::{Db, Tree};

use super::{Allocation, AllocationStore, StoreError};
use crate::address::WalletAddress;
use crate::amount::TokenAmount;

const ALLOCATIONS_TREE: &str = "allocations";

pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Wrap an already-open database (tests use a temporary one).
    pub fn with_db(db: Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(ALLOCATIONS_TREE)?;
        Ok(Self { db, tree })
    }

    fn decode(address: &WalletAddress, raw: &[u8]) -> Result<TokenAmount, StoreError> {
        let s = std::str::from_utf8(raw)
            .map_err(|e| StoreError::Storage(format!("non-utf8 amount for {address}: {e}")))?;
        Ok(TokenAmount::parse(s)?)
    }
}

impl AllocationStore for SledStore {
    fn kind(&self) -> &'static str {
        "sled"
    }

    fn put(&self, address: &WalletAddress, amount: &TokenAmount) -> Result<(), StoreError> {
        self.tree
            .insert(address.as_str().as_bytes(), amount.as_str().as_bytes())?;
        Ok(())
    }

    fn get(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        match self.tree.get(address.as_str().as_bytes())? {
            Some(v) => Ok(Some(Self::decode(address, &v)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, address: &WalletAddress) -> Result<(), StoreError> {
        self.tree.remove(address.as_str().as_bytes())?;
        Ok(())
    }

    fn take(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        // Tree::remove is atomic and returns the previous value
        match self.tree.remove(address.as_str().as_bytes())? {
            Some(v) => Ok(Some(Self::decode(address, &v)?)),
            None => Ok(None),
        }
    }

    fn put_if_absent(
        &self,
        address: &WalletAddress,
        amount: &TokenAmount,
    ) -> Result<bool, StoreError> {
        let swapped = self.tree.compare_and_swap(
            address.as_str().as_bytes(),
            None as Option<&[u8]>,
            Some(amount.as_str().as_bytes()),
        )?;
        Ok(swapped.is_ok())
    }

    fn entries(&self) -> Result<Vec<Allocation>, StoreError> {
        let mut out = Vec::new();
        // sled iterates in key order, which is address order
        for kv in self.tree.iter() {
            let (k, v) = kv?;
            let key = String::from_utf8_lossy(&k).to_string();
            let address = match WalletAddress::parse(&key) {
                Ok(a) => a,
                Err(_) => {
                    tracing::warn!(key = %key, "skipping malformed allocation key");
                    continue;
                }
            };
            let amount = Self::decode(&address, &v)?;
            out.push(Allocation { address, amount });
        }
        Ok(out)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tree.len())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
