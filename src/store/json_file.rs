//! File-backed store using the browser "local storage" layout: one JSON object
//! mapping lowercase addresses to decimal strings.
//!
//! A file that cannot be read or parsed is treated as "no allocations"; the
//! unreadable content is overwritten on the next mutation.
//!
//! Every mutation is rolled back in memory when the file write fails, so the
//! map never holds state that would vanish on restart.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use super::{Allocation, AllocationStore, StoreError};
use crate::address::WalletAddress;
use crate::amount::TokenAmount;

pub struct JsonFileStore {
    path: PathBuf,
    // the mutex also serializes file writes
    map: Mutex<BTreeMap<WalletAddress, TokenAmount>>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let map = load_allocations(&path);
        tracing::info!(path = %path.display(), count = map.len(), "loaded allocation file");
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    fn persist(&self, map: &BTreeMap<WalletAddress, TokenAmount>) -> Result<(), StoreError> {
        let object: serde_json::Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), Value::String(v.as_str().to_string())))
            .collect();
        let body = serde_json::to_string(&Value::Object(object))
            .map_err(|e| StoreError::Storage(format!("serialize allocations: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Read the allocation file, discarding anything unreadable.
fn load_allocations(path: &Path) -> BTreeMap<WalletAddress, TokenAmount> {
    let mut out = BTreeMap::new();
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return out,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "allocation file unreadable, starting empty");
            return out;
        }
    };
    if raw.trim().is_empty() {
        return out;
    }
    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "allocation file is not valid JSON, starting empty");
            return out;
        }
    };
    let Value::Object(entries) = parsed else {
        tracing::warn!(path = %path.display(), "allocation file is not a JSON object, starting empty");
        return out;
    };

    for (key, value) in entries {
        let amount_str = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        match (WalletAddress::parse(&key), TokenAmount::parse(&amount_str)) {
            (Ok(address), Ok(amount)) => {
                out.insert(address, amount);
            }
            _ => tracing::warn!(key = %key, value = %amount_str, "skipping invalid allocation entry"),
        }
    }
    out
}

impl AllocationStore for JsonFileStore {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn put(&self, address: &WalletAddress, amount: &TokenAmount) -> Result<(), StoreError> {
        let mut map = self.map.lock();
        let previous = map.insert(address.clone(), amount.clone());
        if let Err(e) = self.persist(&map) {
            match previous {
                Some(old) => map.insert(address.clone(), old),
                None => map.remove(address),
            };
            return Err(e);
        }
        Ok(())
    }

    fn get(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        Ok(self.map.lock().get(address).cloned())
    }

    fn remove(&self, address: &WalletAddress) -> Result<(), StoreError> {
        let mut map = self.map.lock();
        let Some(amount) = map.remove(address) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&map) {
            map.insert(address.clone(), amount);
            return Err(e);
        }
        Ok(())
    }

    fn take(&self, address: &WalletAddress) -> Result<Option<TokenAmount>, StoreError> {
        let mut map = self.map.lock();
        let Some(amount) = map.remove(address) else {
            return Ok(None);
        };
        if let Err(e) = self.persist(&map) {
            map.insert(address.clone(), amount);
            return Err(e);
        }
        Ok(Some(amount))
    }

    fn put_if_absent(
        &self,
        address: &WalletAddress,
        amount: &TokenAmount,
    ) -> Result<bool, StoreError> {
        let mut map = self.map.lock();
        if map.contains_key(address) {
            return Ok(false);
        }
        map.insert(address.clone(), amount.clone());
        if let Err(e) = self.persist(&map) {
            map.remove(address);
            return Err(e);
        }
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<Allocation>, StoreError> {
        Ok(self
            .map
            .lock()
            .iter()
            .map(|(address, amount)| Allocation {
                address: address.clone(),
                amount: amount.clone(),
            })
            .collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.map.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;
    use std::sync::Arc;

    #[test]
    fn json_store_conformance() {
        let dir = tempfile::tempdir().unwrap();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        conformance::run_all(|| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Arc::new(JsonFileStore::open(dir.path().join(format!("alloc-{n}.json"))).unwrap())
        });
    }

    #[test]
    fn writes_local_storage_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenAllocations.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set_allocation(conformance::ADDR, "100").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "0xabc0000000000000000000000000000000000def": "100" })
        );

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_allocation(conformance::ADDR).unwrap().unwrap().as_str(),
            "100"
        );
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alloc.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 0);

        // next write replaces the unreadable content
        store.set_allocation(conformance::OTHER, "3").unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn non_object_and_odd_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alloc.json");
        fs::write(&path, "[1,2,3]").unwrap();
        assert_eq!(JsonFileStore::open(&path).unwrap().len().unwrap(), 0);

        fs::write(
            &path,
            r#"{"0x1111111111111111111111111111111111111111": 25, "bogus": "1", "0x2222222222222222222222222222222222222222": "x"}"#,
        )
        .unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.get_allocation(conformance::OTHER).unwrap().unwrap().as_str(),
            "25"
        );
    }

    #[test]
    fn failed_writes_leave_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alloc.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set_allocation(conformance::ADDR, "100").unwrap();

        // a directory where the temp file should go makes every write fail
        fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(store.set_allocation(conformance::ADDR, "5").is_err());
        assert!(store.set_allocation(conformance::OTHER, "7").is_err());
        assert!(store.clear_allocation(conformance::ADDR).is_err());
        let other = WalletAddress::parse(conformance::OTHER).unwrap();
        assert!(store.put_if_absent(&other, &TokenAmount::parse("7").unwrap()).is_err());
        let addr = WalletAddress::parse(conformance::ADDR).unwrap();
        assert!(store.take(&addr).is_err());

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get_allocation(conformance::ADDR).unwrap().unwrap().as_str(), "100");
        assert!(store.get_allocation(conformance::OTHER).unwrap().is_none());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get_allocation(conformance::ADDR).unwrap().unwrap().as_str(), "100");
    }
}
