//! The string-keyed persistence layer underneath the vault.
//!
//! The vault only needs a durable map from string to string that can
//! be enumerated and committed in batches.  `KvStore` is that contract;
//! `MemoryStore` backs tests and `FileStore` backs the CLI.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use crate::errors::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Namespace holding the encrypted entries.
pub const ENTRY_NAMESPACE: &str = "VaultAIPasswords";

/// Namespace holding master-key material and session state.
pub const AUTH_NAMESPACE: &str = "VaultAIAuth";

/// Auth-namespace key of the base64 salt behind the shared `v3` key.
pub const MASTER_SALT_KEY: &str = "master_salt_b64";

/// One mutation inside a batch commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: String },
    Remove { key: String },
}

impl BatchOp {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }
}

/// A durable, enumerable string map.
///
/// Implementations must make `apply` all-or-nothing and must never let
/// `snapshot` observe part of a batch.
pub trait KvStore: Send + Sync {
    /// Look up a single value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a single value.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key.  Returns whether it was present.
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// A consistent copy of the whole map.
    fn snapshot(&self) -> Result<BTreeMap<String, String>>;

    /// Commit a batch of mutations as one unit.
    fn apply(&self, ops: Vec<BatchOp>) -> Result<()>;

    /// Drop every key.
    fn clear(&self) -> Result<()>;

    /// Whether a key is present.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Apply `ops` to `map` in order.
pub(crate) fn apply_ops(map: &mut BTreeMap<String, String>, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Remove { key } => {
                map.remove(&key);
            }
        }
    }
}
