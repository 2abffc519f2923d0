//! High-level vault operations used by CLI commands.
//!
//! `VaultStore` ties the entry namespace, the master-key cache and the
//! envelope codec together so the rest of the application can work with
//! calls like `store.save("m1", &entry)`.
//!
//! Concurrency: a commit gate (`RwLock<()>`) is taken shared by ordinary
//! operations and exclusively by rotation and reset.  Batches are
//! committed through `KvStore::apply`, so a listing sees either none or
//! all of a batch.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use tracing::{debug, info, warn};

use crate::crypto::cache::{KeyCache, KeySession};
use crate::envelope::{self, SchemeVersion};
use crate::errors::{FailureKind, VaultError, Result};
use crate::storage::{BatchOp, KvStore};

use super::entry::{composite_key, legacy_key, Entry, KEY_PREFIX};
use super::report::{
    EntryList, ExportReport, ImportPreview, ImportReport, KeyOutcome, ListedItem, Listing,
    RotationReport,
};
use super::transfer::{entries_from_json, entries_to_json, is_importable, ImportPolicy};

/// Worker count used when the hardware cannot be queried.
const DEFAULT_WORKERS: usize = 4;

/// The main vault handle.
pub struct VaultStore {
    /// Entry namespace: `password_<site>|<username>` -> envelope.
    entries: Arc<dyn KvStore>,

    /// Master salt provisioning and the live key epoch.
    keys: KeyCache,

    /// Shared for ordinary operations, exclusive for rotation and reset.
    gate: RwLock<()>,

    /// Threads used for bulk decoding.
    workers: usize,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build a store over an entry namespace and an auth namespace.
    pub fn new(entries: Arc<dyn KvStore>, auth: Arc<dyn KvStore>) -> Self {
        Self {
            entries,
            keys: KeyCache::new(auth),
            gate: RwLock::new(()),
            workers: resolve_workers(0),
        }
    }

    /// Set the bulk-decode worker count.  `0` means one per CPU.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = resolve_workers(workers);
        self
    }

    /// The master-key cache behind this store.
    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    // ------------------------------------------------------------------
    // Entry operations
    // ------------------------------------------------------------------

    /// Encrypt `entry` as `v3` and store it under its composite key,
    /// replacing any previous value.
    pub fn save(&self, passphrase: &str, entry: &Entry) -> Result<()> {
        entry.validate()?;
        let _shared = self.shared();

        let mut session = self.keys.session(passphrase);
        let sealed = envelope::encode(&entry.to_plaintext(), &mut session)?;
        self.entries.put(&entry.key(), &sealed)?;

        debug!(key = %entry.key(), "saved entry");
        Ok(())
    }

    /// Save several entries as one commit.
    ///
    /// Every entry is validated and encrypted before the store is
    /// touched; any failure aborts with nothing written.
    pub fn save_batch(&self, passphrase: &str, entries: &[Entry]) -> Result<usize> {
        for entry in entries {
            entry.validate()?;
        }
        let _shared = self.shared();

        let mut session = self.keys.session(passphrase);
        let ops = entries
            .iter()
            .map(|entry| {
                let sealed = envelope::encode(&entry.to_plaintext(), &mut session)?;
                Ok(BatchOp::put(entry.key(), sealed))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = ops.len();
        self.entries.apply(ops)?;
        info!(count, "saved entry batch");
        Ok(count)
    }

    /// Replace an entry, possibly under a new identity.
    ///
    /// When the site or username changes, the old composite key and the
    /// old site's legacy key are removed in the same commit that writes
    /// the new value.
    pub fn update(
        &self,
        passphrase: &str,
        previous_site: &str,
        previous_username: &str,
        entry: &Entry,
    ) -> Result<()> {
        entry.validate()?;
        let _shared = self.shared();

        let mut session = self.keys.session(passphrase);
        let sealed = envelope::encode(&entry.to_plaintext(), &mut session)?;

        let mut ops = Vec::with_capacity(3);
        let identity_changed =
            entry.site_name != previous_site || entry.username != previous_username;
        if identity_changed {
            ops.push(BatchOp::remove(composite_key(previous_site, previous_username)));
            ops.push(BatchOp::remove(legacy_key(previous_site)));
        }
        ops.push(BatchOp::put(entry.key(), sealed));
        self.entries.apply(ops)?;

        debug!(key = %entry.key(), identity_changed, "updated entry");
        Ok(())
    }

    /// Decrypt every stored entry.
    ///
    /// A failure on one key never aborts the listing: that item carries
    /// its `FailureKind` and renders as a placeholder.
    pub fn list_all(&self, passphrase: &str) -> Result<Listing> {
        let _shared = self.shared();
        let records = self.stored_records()?;

        let mut session = self.keys.session(passphrase);
        let items = records
            .into_iter()
            .map(|(key, stored)| {
                let result = envelope::decode(&stored, &mut session).map_err(|e| {
                    warn!(key = %key, error = %e, "entry failed to decode");
                    e.kind()
                });
                ListedItem { key, result }
            })
            .collect::<Vec<_>>();

        let listing = Listing { items };
        debug!(
            total = listing.len(),
            failed = listing.failed_count(),
            "listed entries"
        );
        Ok(listing)
    }

    /// `list_all`, with each plaintext parsed back into an `Entry`.
    pub fn list_entries(&self, passphrase: &str) -> Result<EntryList> {
        let listing = self.list_all(passphrase)?;
        let mut out = EntryList::default();

        for item in listing.items {
            match item.result.map(|text| Entry::parse(&text)) {
                Ok(Ok(entry)) => out.entries.push((item.key, entry)),
                Ok(Err(_)) => out.failed.push(KeyOutcome {
                    key: item.key,
                    failure: FailureKind::Other,
                }),
                Err(failure) => out.failed.push(KeyOutcome {
                    key: item.key,
                    failure,
                }),
            }
        }
        Ok(out)
    }

    /// Remove an entry and any legacy single-field record for its site.
    ///
    /// Returns whether anything was removed.
    pub fn delete(&self, site: &str, username: &str) -> Result<bool> {
        let _shared = self.shared();

        let ops: Vec<BatchOp> = [composite_key(site, username), legacy_key(site)]
            .into_iter()
            .filter_map(|key| match self.entries.contains(&key) {
                Ok(true) => Some(Ok(BatchOp::remove(key))),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<_>>()?;

        if ops.is_empty() {
            return Ok(false);
        }
        let removed = ops.len();
        self.entries.apply(ops)?;
        debug!(site, username, removed, "deleted entry");
        Ok(true)
    }

    /// Remove only the legacy single-field record `password_<site>`.
    pub fn delete_site(&self, site: &str) -> Result<bool> {
        let _shared = self.shared();
        self.entries.remove(&legacy_key(site))
    }

    /// Check `passphrase` against the stored `v3` entries.
    ///
    /// Accepts as soon as one entry authenticates (the key is then live
    /// for this store).  Fails with `AuthenticationFailed` only when `v3`
    /// entries exist and none of them authenticates, so one damaged
    /// record cannot lock out the right passphrase.  Entries too damaged
    /// to parse are passed over.  A vault with no `v3` entry accepts any
    /// passphrase.
    pub fn verify_passphrase(&self, passphrase: &str) -> Result<()> {
        let _shared = self.shared();
        let mut session = self.keys.session(passphrase);
        self.authenticate(&mut session)
    }

    /// Whether an entry exists for `(site, username)`.
    pub fn contains(&self, site: &str, username: &str) -> Result<bool> {
        self.entries.contains(&composite_key(site, username))
    }

    // ------------------------------------------------------------------
    // Rotation
    // ------------------------------------------------------------------

    /// Re-encrypt every entry from `old_passphrase` to `new_passphrase`.
    ///
    /// 1. Hold the gate exclusively so no save or listing interleaves.
    /// 2. Refuse if `old_passphrase` opens none of the `v3` entries or
    ///    is not the live passphrase.
    /// 3. Derive the new key from the existing master salt.
    /// 4. Decode each entry under the old passphrase (any scheme) and
    ///    re-encrypt it as `v3`; entries that do not decode are skipped
    ///    and left as they are.
    /// 5. Commit all replacements as one batch.
    /// 6. Install the new key as the next epoch.
    pub fn re_encrypt_all(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
    ) -> Result<RotationReport> {
        // 1.
        let _exclusive = self.exclusive();

        // 2.
        let mut old_session = self.keys.session(old_passphrase);
        self.authenticate(&mut old_session)?;
        old_session.write_key()?;

        // 3.
        let next = self.keys.prepare(new_passphrase)?;

        // 4.
        let mut report = RotationReport::default();
        let mut ops = Vec::new();
        for (key, stored) in self.stored_records()? {
            match envelope::decode(&stored, &mut old_session) {
                Ok(plaintext) => {
                    let sealed = envelope::seal_v3(&plaintext, next.key())?;
                    ops.push(BatchOp::put(key.clone(), sealed));
                    report.migrated.push(key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "leaving entry unmigrated");
                    report.skipped.push(KeyOutcome {
                        key,
                        failure: e.kind(),
                    });
                }
            }
        }

        // 5.
        self.entries.apply(ops)?;

        // 6.
        report.epoch = self.keys.replace(&next).epoch();
        info!(
            migrated = report.migrated.len(),
            skipped = report.skipped.len(),
            epoch = report.epoch,
            "re-encrypted vault"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Decode every entry and wrap them as one `v2` export blob.
    ///
    /// Decoding runs on `workers` scoped threads.  Entries that fail to
    /// decode or parse are counted in `failed` and left out.
    pub fn export(&self, passphrase: &str) -> Result<ExportReport> {
        let _shared = self.shared();
        let records = self.stored_records()?;

        let mut session = self.keys.session(passphrase);
        if records
            .iter()
            .any(|(_, stored)| SchemeVersion::detect(stored) == SchemeVersion::V3)
        {
            // Resolve once so the workers share one derivation.
            session.read_key()?;
        }

        let decoded = self.decode_parallel(&records, &session)?;

        let mut entries = Vec::with_capacity(decoded.len());
        let mut failed = Vec::new();
        for (key, result) in decoded {
            match result {
                Ok(entry) => entries.push(entry),
                Err(failure) => failed.push(KeyOutcome { key, failure }),
            }
        }

        let blob = envelope::encode_export(&entries_to_json(&entries)?, passphrase)?;
        let report = ExportReport {
            blob,
            total: records.len(),
            exported: entries.len(),
            failed,
        };
        info!(
            total = report.total,
            exported = report.exported,
            failed = report.failed.len(),
            "exported vault"
        );
        Ok(report)
    }

    /// Decrypt an export blob back into entries.
    ///
    /// Any envelope version is accepted, not only `v2`.
    pub fn read_export(&self, blob: &str, passphrase: &str) -> Result<Vec<Entry>> {
        let mut session = self.keys.session(passphrase);
        let json = envelope::decode(blob.trim(), &mut session)?;
        entries_from_json(&json)
    }

    /// Count how many of `entries` would collide with stored keys.
    pub fn preview_import(&self, entries: &[Entry]) -> Result<ImportPreview> {
        let existing = self.existing_keys()?;
        let duplicates = entries
            .iter()
            .filter(|e| existing.contains(&e.key()))
            .count();
        Ok(ImportPreview {
            total: entries.len(),
            duplicates,
        })
    }

    /// Import `entries` according to `policy`, as one commit.
    ///
    /// Entries missing a site, username or password are rejected.
    /// Under `Overwrite`, an existing entry's composite key and its
    /// site's legacy key are removed before the new value is written.
    pub fn import(
        &self,
        passphrase: &str,
        entries: &[Entry],
        policy: ImportPolicy,
    ) -> Result<ImportReport> {
        let _shared = self.shared();
        let existing = self.existing_keys()?;

        let mut session = self.keys.session(passphrase);
        let mut report = ImportReport::default();
        let mut ops = Vec::new();

        for entry in entries {
            if !is_importable(entry) {
                report.rejected += 1;
                continue;
            }

            let key = entry.key();
            if existing.contains(&key) {
                match policy {
                    ImportPolicy::Additive => {
                        report.skipped += 1;
                        continue;
                    }
                    ImportPolicy::Overwrite => {
                        ops.push(BatchOp::remove(key.clone()));
                        ops.push(BatchOp::remove(legacy_key(&entry.site_name)));
                        report.overwritten += 1;
                    }
                }
            }

            let sealed = envelope::encode(&entry.to_plaintext(), &mut session)?;
            ops.push(BatchOp::put(key, sealed));
            report.imported += 1;
        }

        if !ops.is_empty() {
            self.entries.apply(ops)?;
        }
        info!(
            %policy,
            imported = report.imported,
            overwritten = report.overwritten,
            skipped = report.skipped,
            rejected = report.rejected,
            "imported entries"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Delete every entry and all master-key material.
    pub fn reset(&self) -> Result<()> {
        let _exclusive = self.exclusive();
        self.entries.clear()?;
        self.keys.reset()?;
        info!("vault reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try `session` against the stored `v3` entries; see
    /// `verify_passphrase`.  The caller holds the gate.
    fn authenticate(&self, session: &mut KeySession<'_>) -> Result<()> {
        let mut rejected = 0usize;
        for (key, stored) in self.stored_records()? {
            if SchemeVersion::detect(&stored) != SchemeVersion::V3 {
                continue;
            }
            match envelope::decode(&stored, session) {
                Ok(_) => return Ok(()),
                Err(VaultError::AuthenticationFailed) => {
                    debug!(key = %key, "entry did not authenticate");
                    rejected += 1;
                }
                Err(e) => debug!(key = %key, error = %e, "passing over unreadable entry"),
            }
        }
        if rejected > 0 {
            return Err(VaultError::AuthenticationFailed);
        }
        Ok(())
    }

    /// Entry-namespace records with a non-blank value, in key order.
    fn stored_records(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .snapshot()?
            .into_iter()
            .filter(|(key, value)| key.starts_with(KEY_PREFIX) && !value.trim().is_empty())
            .collect())
    }

    fn existing_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .entries
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .collect())
    }

    /// Decode and parse `records` on scoped worker threads, keeping
    /// input order.
    fn decode_parallel(
        &self,
        records: &[(String, String)],
        session: &KeySession<'_>,
    ) -> Result<Vec<(String, std::result::Result<Entry, FailureKind>)>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let workers = self.workers.clamp(1, records.len());
        let chunk_len = (records.len() + workers - 1) / workers;

        thread::scope(|scope| {
            let handles: Vec<_> = records
                .chunks(chunk_len)
                .map(|chunk| {
                    let mut session = session.clone();
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|(key, stored)| {
                                let result = envelope::decode(stored, &mut session)
                                    .and_then(|text| Entry::parse(&text))
                                    .map_err(|e| {
                                        warn!(key = %key, error = %e, "entry skipped in export");
                                        e.kind()
                                    });
                                (key.clone(), result)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut out = Vec::with_capacity(records.len());
            for handle in handles {
                let part = handle
                    .join()
                    .map_err(|_| VaultError::CommandFailed("export worker panicked".into()))?;
                out.extend(part);
            }
            Ok(out)
        })
    }
}

/// `0` means one worker per available CPU.
fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(DEFAULT_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> VaultStore {
        VaultStore::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn resolve_workers_keeps_explicit_count() {
        assert_eq!(resolve_workers(3), 3);
        assert!(resolve_workers(0) >= 1);
    }

    #[test]
    fn save_then_list_then_delete() {
        let store = store();
        store.save("m1", &Entry::new("bank", "alice", "p1", "")).unwrap();

        let list = store.list_entries("m1").unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.entries[0].1, Entry::new("bank", "alice", "p1", ""));

        assert!(store.delete("bank", "alice").unwrap());
        assert!(store.list_all("m1").unwrap().is_empty());
        assert!(!store.delete("bank", "alice").unwrap());
    }

    #[test]
    fn blank_values_and_foreign_keys_are_not_listed() {
        let entries = Arc::new(MemoryStore::with_entries([
            ("password_x|y", "   "),
            ("theme_mode", "dark"),
        ]));
        let store = VaultStore::new(entries, Arc::new(MemoryStore::new()));
        assert!(store.list_all("m1").unwrap().is_empty());
    }

    #[test]
    fn update_moves_identity_in_one_commit() {
        let store = store();
        store.save("m1", &Entry::new("old", "u", "p", "")).unwrap();

        store
            .update("m1", "old", "u", &Entry::new("new", "u", "p2", "n"))
            .unwrap();

        assert!(!store.contains("old", "u").unwrap());
        assert!(store.contains("new", "u").unwrap());
    }

    #[test]
    fn verify_passphrase_checks_against_stored_entries() {
        let store = store();
        store.verify_passphrase("anything").unwrap();

        store.save("m1", &Entry::new("a", "u", "p", "")).unwrap();
        store.verify_passphrase("m1").unwrap();
        assert!(matches!(
            store.verify_passphrase("m2"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn verify_passphrase_passes_over_a_tampered_first_entry() {
        let entries = Arc::new(MemoryStore::new());
        let auth = Arc::new(MemoryStore::new());
        let first = VaultStore::new(entries.clone(), auth.clone());
        first.save("m1", &Entry::new("a", "u", "p", "")).unwrap();
        first.save("m1", &Entry::new("z", "u", "p", "")).unwrap();

        let key = composite_key("a", "u");
        let stored = entries.get(&key).unwrap().unwrap();
        let mut raw = envelope::format::decode_base64(&stored["v3:".len()..]).unwrap();
        raw[14] ^= 0x01;
        entries
            .put(&key, &format!("v3:{}", base64_encode(&raw)))
            .unwrap();

        let fresh = VaultStore::new(entries, auth);
        fresh.verify_passphrase("m1").unwrap();
        assert!(fresh.key_cache().snapshot().is_some());
        assert!(matches!(
            fresh.verify_passphrase("m2"),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    fn base64_encode(raw: &[u8]) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(raw)
    }

    #[test]
    fn save_with_other_passphrase_is_refused() {
        let store = store();
        store.save("m1", &Entry::new("a", "u", "p", "")).unwrap();
        let err = store
            .save("m2", &Entry::new("b", "u", "p", ""))
            .unwrap_err();
        assert!(matches!(err, VaultError::StaleEpoch));
        assert!(!store.contains("b", "u").unwrap());
    }
}
