//! Master-key provisioning and caching.
//!
//! PBKDF2 is deliberately slow, so the key behind `v3` envelopes is
//! derived once and cached for the life of a `VaultStore`.  The cache
//! holds at most one live `KeyEpoch`: an immutable (epoch, key,
//! passphrase fingerprint) triple that is replaced wholesale on
//! rotation and never mutated in place.  Every operation works from a
//! `KeySession`, which snapshots the live epoch when it is created.
//!
//! Adoption rules:
//! - A key whose passphrase matches the live epoch is served from cache.
//! - Otherwise the key is derived "detached" (epoch 0) and used only by
//!   the operation that asked for it.
//! - A detached key enters an empty cache when it is used to write, or
//!   once it has authenticated a `v3` envelope.
//! - Writes refuse a passphrase that disagrees with a live epoch.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::kdf::{derive_key, generate_salt, MasterKey, SALT_LEN};
use crate::errors::{VaultError, Result};
use crate::storage::{KvStore, MASTER_SALT_KEY};

/// One generation of the shared master key.
pub struct KeyEpoch {
    epoch: u64,
    key: MasterKey,
    fingerprint: Zeroizing<[u8; 32]>,
}

impl KeyEpoch {
    fn detached(key: MasterKey, fingerprint: Zeroizing<[u8; 32]>) -> Self {
        Self {
            epoch: 0,
            key,
            fingerprint,
        }
    }

    fn promoted(&self, epoch: u64) -> Self {
        Self {
            epoch,
            key: self.key.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Epoch number; `0` means the key was never installed in the cache.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_detached(&self) -> bool {
        self.epoch == 0
    }

    pub fn key(&self) -> &MasterKey {
        &self.key
    }

    fn matches(&self, fingerprint: &[u8; 32]) -> bool {
        self.fingerprint.ct_eq(fingerprint).into()
    }
}

impl std::fmt::Debug for KeyEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEpoch").field("epoch", &self.epoch).finish()
    }
}

/// Cache of the shared master key plus the salt it is derived from.
pub struct KeyCache {
    auth: Arc<dyn KvStore>,
    salt_gate: Mutex<()>,
    live: RwLock<Option<Arc<KeyEpoch>>>,
    last_epoch: Mutex<u64>,
}

impl KeyCache {
    pub fn new(auth: Arc<dyn KvStore>) -> Self {
        Self {
            auth,
            salt_gate: Mutex::new(()),
            live: RwLock::new(None),
            last_epoch: Mutex::new(0),
        }
    }

    /// Read the installation's master salt, creating it on first use.
    ///
    /// Creation happens under `salt_gate` with a re-read, so two threads
    /// racing through first use persist a single salt.
    pub fn master_salt(&self) -> Result<Vec<u8>> {
        if let Some(salt) = self.read_salt()? {
            return Ok(salt);
        }

        let _gate = self.salt_gate.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(salt) = self.read_salt()? {
            return Ok(salt);
        }

        let salt = generate_salt();
        self.auth.put(MASTER_SALT_KEY, &BASE64.encode(salt))?;
        info!("generated new master salt");
        Ok(salt.to_vec())
    }

    fn read_salt(&self) -> Result<Option<Vec<u8>>> {
        let Some(encoded) = self.auth.get(MASTER_SALT_KEY)? else {
            return Ok(None);
        };
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let salt = BASE64.decode(compact).map_err(|e| {
            VaultError::MalformedEnvelope(format!("stored master salt is not base64: {e}"))
        })?;
        if salt.len() != SALT_LEN {
            return Err(VaultError::MalformedEnvelope(format!(
                "stored master salt is {} bytes, expected {SALT_LEN}",
                salt.len()
            )));
        }
        Ok(Some(salt))
    }

    /// The live epoch, if any.
    pub fn snapshot(&self) -> Option<Arc<KeyEpoch>> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a per-operation session for `passphrase`.
    pub fn session<'a>(&'a self, passphrase: &'a str) -> KeySession<'a> {
        KeySession {
            cache: self,
            passphrase,
            live: self.snapshot(),
            resolved: None,
        }
    }

    /// Derive a detached key for `passphrase` from the master salt.
    fn derive_detached(&self, passphrase: &str) -> Result<Arc<KeyEpoch>> {
        let salt = self.master_salt()?;
        let key = derive_key(passphrase.as_bytes(), &salt)?;
        debug!("derived master key");
        Ok(Arc::new(KeyEpoch::detached(
            key,
            fingerprint(&salt, passphrase),
        )))
    }

    /// Install `candidate` if nothing is live yet; otherwise return the
    /// live epoch unchanged.
    fn adopt(&self, candidate: &KeyEpoch) -> Arc<KeyEpoch> {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = live.as_ref() {
            return Arc::clone(current);
        }
        let installed = Arc::new(candidate.promoted(self.next_epoch()));
        debug!(epoch = installed.epoch, "installed master key epoch");
        *live = Some(Arc::clone(&installed));
        installed
    }

    /// Derive the key for `passphrase` without touching the cache.
    ///
    /// Used by rotation, which installs the result only after its batch
    /// has been committed.
    pub fn prepare(&self, passphrase: &str) -> Result<Arc<KeyEpoch>> {
        self.derive_detached(passphrase)
    }

    /// Replace the live epoch with `next`, discarding the previous key.
    pub fn replace(&self, next: &KeyEpoch) -> Arc<KeyEpoch> {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        let installed = Arc::new(next.promoted(self.next_epoch()));
        info!(epoch = installed.epoch, "rotated master key epoch");
        *live = Some(Arc::clone(&installed));
        installed
    }

    /// Forget the live epoch.
    pub fn invalidate(&self) {
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Wipe the auth namespace (master salt included) and the live epoch.
    ///
    /// The next derivation provisions a fresh salt.
    pub fn reset(&self) -> Result<()> {
        let _gate = self.salt_gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.auth.clear()?;
        self.invalidate();
        info!("cleared master key material");
        Ok(())
    }

    fn next_epoch(&self) -> u64 {
        let mut last = self.last_epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *last += 1;
        *last
    }

    fn fingerprint_for(&self, passphrase: &str) -> Result<Zeroizing<[u8; 32]>> {
        let salt = self.master_salt()?;
        Ok(fingerprint(&salt, passphrase))
    }
}

fn fingerprint(salt: &[u8], passphrase: &str) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(passphrase.as_bytes());
    Zeroizing::new(hasher.finalize().into())
}

/// A single operation's view of the master key.
///
/// The live epoch is captured at creation; derivation happens lazily,
/// at most once, and only if a `v3` envelope is read or written.
/// Cloning a session after the key is resolved shares that key.
#[derive(Clone)]
pub struct KeySession<'a> {
    cache: &'a KeyCache,
    passphrase: &'a str,
    live: Option<Arc<KeyEpoch>>,
    resolved: Option<Arc<KeyEpoch>>,
}

impl<'a> KeySession<'a> {
    pub fn passphrase(&self) -> &'a str {
        self.passphrase
    }

    /// Key for decrypting `v3` envelopes.
    pub fn read_key(&mut self) -> Result<Arc<KeyEpoch>> {
        if let Some(key) = &self.resolved {
            return Ok(Arc::clone(key));
        }
        let key = match self.matching_live()? {
            Some(live) => live,
            None => self.cache.derive_detached(self.passphrase)?,
        };
        self.resolved = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Key for producing `v3` envelopes.
    ///
    /// Fails with `StaleEpoch` when another passphrase owns the cache.
    pub fn write_key(&mut self) -> Result<Arc<KeyEpoch>> {
        let key = self.read_key()?;
        if !key.is_detached() {
            return Ok(key);
        }
        if self.live.is_some() {
            return Err(VaultError::StaleEpoch);
        }
        let adopted = self.cache.adopt(&key);
        if !adopted.matches(&key.fingerprint) {
            // Someone else installed a different passphrase meanwhile.
            return Err(VaultError::StaleEpoch);
        }
        self.resolved = Some(Arc::clone(&adopted));
        Ok(adopted)
    }

    /// Record that the resolved key just authenticated a `v3` envelope.
    pub fn confirm(&mut self) {
        if self.live.is_some() {
            return;
        }
        if let Some(key) = self.resolved.as_ref().filter(|k| k.is_detached()) {
            let adopted = self.cache.adopt(key);
            if adopted.matches(&key.fingerprint) {
                self.resolved = Some(adopted);
            }
        }
    }

    fn matching_live(&self) -> Result<Option<Arc<KeyEpoch>>> {
        let Some(live) = &self.live else {
            return Ok(None);
        };
        let fp = self.cache.fingerprint_for(self.passphrase)?;
        Ok(live.matches(&fp).then(|| Arc::clone(live)))
    }
}
