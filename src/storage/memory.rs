//! In-process `KvStore`.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{apply_ops, BatchOp, KvStore};
use crate::errors::Result;

/// A `KvStore` that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            map: RwLock::new(map),
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.keys().cloned().collect())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.clone())
    }

    fn apply(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        apply_ops(&mut map, ops);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        Ok(())
    }
}
