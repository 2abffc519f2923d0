//! File-backed `KvStore`: one JSON object per namespace.
//!
//! The whole map is kept in memory and rewritten on every mutation:
//!
//! 1. Serialize the new map to JSON.
//! 2. Write it to a temp file in the same directory and fsync it.
//! 3. Rename the temp file over the target path.
//! 4. Only then publish the new map to readers.
//!
//! The rename means a crash leaves either the old or the new file on
//! disk, and holding the write lock across all four steps means readers
//! never see a half-applied batch.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::{apply_ops, BatchOp, KvStore};
use crate::errors::{VaultError, Result};

/// A `KvStore` persisted as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store; the file appears on first write.
    pub fn open(path: &Path) -> Result<Self> {
        let map = if path.exists() {
            let data = fs::read(path)?;
            if data.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&data).map_err(|e| {
                    VaultError::Storage(format!("cannot parse {}: {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = map.len(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            map: RwLock::new(map),
        })
    }

    /// Open the file for `namespace` inside `dir` (`<dir>/<namespace>.json`).
    pub fn open_namespace(dir: &Path, namespace: &str) -> Result<Self> {
        Self::open(&dir.join(format!("{namespace}.json")))
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `mutate` on a copy of the map, persist the copy, then publish it.
    fn commit<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = map.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| VaultError::SerializationError(format!("store map: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        // A leftover temp file would keep its old mode.
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        // Owner-only from creation: the values are ciphertext, but the
        // keys name sites and usernames.
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.commit(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        if !self.contains(key)? {
            return Ok(false);
        }
        self.commit(|m| {
            m.remove(key);
        })?;
        Ok(true)
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
        let count = ops.len();
        self.commit(|m| apply_ops(m, ops))?;
        debug!(path = %self.path.display(), ops = count, "committed batch");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.commit(BTreeMap::clear)
    }
}
