//! Integration tests for the VaultAI vault module.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use vaultai::envelope;
use vaultai::errors::{FailureKind, VaultError};
use vaultai::storage::{FileStore, KvStore, MemoryStore, AUTH_NAMESPACE, ENTRY_NAMESPACE};
use vaultai::vault::{composite_key, legacy_key, Entry, VaultStore};
use tempfile::TempDir;

/// Helper: a store over in-memory namespaces, plus handles to both.
fn memory_store() -> (Arc<MemoryStore>, Arc<MemoryStore>, VaultStore) {
    let entries = Arc::new(MemoryStore::new());
    let auth = Arc::new(MemoryStore::new());
    let store = VaultStore::new(entries.clone(), auth.clone());
    (entries, auth, store)
}

/// Helper: open a store over the file namespaces in `dir`.
fn file_store(dir: &std::path::Path) -> VaultStore {
    let entries = FileStore::open_namespace(dir, ENTRY_NAMESPACE).unwrap();
    let auth = FileStore::open_namespace(dir, AUTH_NAMESPACE).unwrap();
    VaultStore::new(Arc::new(entries), Arc::new(auth))
}

// ---------------------------------------------------------------------------
// Save / list / delete scenario
// ---------------------------------------------------------------------------

#[test]
fn save_list_delete_scenario() {
    let (_entries, _auth, store) = memory_store();
    let entry = Entry::new("bank", "alice", "p1", "");

    store.save("m1", &entry).unwrap();

    let listing = store.list_all("m1").unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(Entry::parse(&listing.texts()[0]).unwrap(), entry);

    assert!(store.delete("bank", "alice").unwrap());
    assert!(store.list_all("m1").unwrap().is_empty());
}

#[test]
fn saved_entry_lists_back_unchanged_and_can_be_deleted() {
    let (_entries, _auth, store) = memory_store();
    let entry = Entry::new(" bank", "alice", " secret ", "a\nb ");
    store.save("m1", &entry).unwrap();

    let list = store.list_entries("m1").unwrap();
    assert_eq!(list.entries[0].1, entry);
    assert_eq!(list.entries[0].0, entry.key());
    assert!(store.delete(&entry.site_name, &entry.username).unwrap());
}

#[test]
fn note_with_divider_line_is_not_saved() {
    let (entries, _auth, store) = memory_store();
    let entry = Entry::new("bank", "alice", "p", "a\n------------------------\nb");
    assert!(matches!(
        store.save("m1", &entry),
        Err(VaultError::InvalidEntry(_))
    ));
    assert!(entries.keys().unwrap().is_empty());
}

#[test]
fn save_overwrites_same_key() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("bank", "alice", "p1", "")).unwrap();
    store.save("m1", &Entry::new("bank", "alice", "p2", "n")).unwrap();

    assert_eq!(entries.keys().unwrap(), vec!["password_bank|alice"]);
    let list = store.list_entries("m1").unwrap();
    assert_eq!(list.entries[0].1.password, "p2");
}

#[test]
fn empty_site_and_username_are_valid() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("", "", "p", "")).unwrap();
    assert!(entries.contains("password_|").unwrap());
    assert_eq!(store.list_entries("m1").unwrap().entries.len(), 1);
}

#[test]
fn every_save_writes_v3() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("a", "b", "c", "")).unwrap();
    let stored = entries.get(&composite_key("a", "b")).unwrap().unwrap();
    assert!(stored.starts_with("v3:"));
}

#[test]
fn file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    file_store(dir.path())
        .save("m1", &Entry::new("bank", "alice", "p1", "n"))
        .unwrap();

    let reopened = file_store(dir.path());
    let list = reopened.list_entries("m1").unwrap();
    assert_eq!(list.entries.len(), 1);
    assert_eq!(list.entries[0].1, Entry::new("bank", "alice", "p1", "n"));
    assert_eq!(reopened.key_cache().snapshot().unwrap().epoch(), 1);
}

// ---------------------------------------------------------------------------
// Composite keys
// ---------------------------------------------------------------------------

#[test]
fn composite_keys_are_distinct_for_distinct_pairs() {
    let pairs = [
        ("a", "b"),
        ("a", "bc"),
        ("ab", "c"),
        ("", "abc"),
        ("abc", ""),
        ("a", "b|c"),
    ];
    let keys: BTreeSet<String> = pairs.iter().map(|(s, u)| composite_key(s, u)).collect();
    assert_eq!(keys.len(), pairs.len());
}

#[test]
fn site_with_separator_is_rejected_on_every_write_path() {
    let (entries, _auth, store) = memory_store();
    let bad = Entry::new("a|b", "c", "p", "");

    assert!(matches!(store.save("m1", &bad), Err(VaultError::InvalidEntry(_))));
    assert!(matches!(
        store.save_batch("m1", &[bad.clone()]),
        Err(VaultError::InvalidEntry(_))
    ));
    assert!(matches!(
        store.update("m1", "x", "y", &bad),
        Err(VaultError::InvalidEntry(_))
    ));
    assert!(entries.keys().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Batch save
// ---------------------------------------------------------------------------

#[test]
fn save_batch_writes_all_entries() {
    let (entries, _auth, store) = memory_store();
    let batch: Vec<Entry> = (0..5)
        .map(|i| Entry::new(format!("site{i}"), "u", "p", ""))
        .collect();

    assert_eq!(store.save_batch("m1", &batch).unwrap(), 5);
    assert_eq!(entries.keys().unwrap().len(), 5);
}

#[test]
fn save_batch_with_one_invalid_entry_writes_nothing() {
    let (entries, _auth, store) = memory_store();
    let batch = vec![
        Entry::new("good", "u", "p", ""),
        Entry::new("bad|site", "u", "p", ""),
    ];

    assert!(store.save_batch("m1", &batch).is_err());
    assert!(entries.keys().unwrap().is_empty());
}

#[test]
fn save_batch_under_stale_passphrase_writes_nothing() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("first", "u", "p", "")).unwrap();

    let err = store
        .save_batch("m2", &[Entry::new("second", "u", "p", "")])
        .unwrap_err();
    assert!(matches!(err, VaultError::StaleEpoch));
    assert_eq!(entries.keys().unwrap().len(), 1);
}

#[test]
fn concurrent_listing_never_sees_half_a_batch() {
    let (_entries, _auth, store) = memory_store();
    let store = Arc::new(store);
    let sites: Vec<String> = (0..6).map(|i| format!("site{i}")).collect();
    let generation = |g: usize| -> Vec<Entry> {
        sites
            .iter()
            .map(|s| Entry::new(s.clone(), "u", "p", format!("gen-{g}")))
            .collect()
    };

    store.save_batch("m1", &generation(0)).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for g in 1..=20 {
                store.save_batch("m1", &generation(g)).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let list = store.list_entries("m1").unwrap();
                assert_eq!(list.entries.len(), 6);
                let notes: BTreeSet<&str> =
                    list.entries.iter().map(|(_, e)| e.note.as_str()).collect();
                assert_eq!(notes.len(), 1, "mixed generations: {notes:?}");
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Listing with failures
// ---------------------------------------------------------------------------

#[test]
fn one_corrupt_entry_does_not_hide_the_others() {
    let (entries, _auth, store) = memory_store();
    for i in 0..3 {
        store
            .save("m1", &Entry::new(format!("s{i}"), "u", "p", ""))
            .unwrap();
    }
    entries.put("password_broken|u", "v3:@@not base64@@").unwrap();

    let listing = store.list_all("m1").unwrap();
    assert_eq!(listing.len(), 4);
    assert_eq!(listing.failed_count(), 1);

    let failures = listing.failures();
    assert_eq!(failures[0].key, "password_broken|u");
    assert_eq!(failures[0].failure, FailureKind::MalformedEnvelope);
    assert!(listing
        .texts()
        .contains(&"【解密失败】网站: broken|u".to_string()));
}

#[test]
fn wrong_passphrase_lists_placeholders_for_aead_entries() {
    let (entries, auth, store) = memory_store();
    store.save("m1", &Entry::new("a", "u", "p", "")).unwrap();

    // Same store: the live key is never used for another passphrase.
    let listing = store.list_all("m2").unwrap();
    assert_eq!(listing.failures()[0].failure, FailureKind::Authentication);

    // Fresh cache over the same salt: same outcome, and no adoption.
    let other = VaultStore::new(entries, auth);
    assert_eq!(other.list_all("m2").unwrap().failed_count(), 1);
    assert!(other.key_cache().snapshot().is_none());
}

#[test]
fn legacy_and_v2_records_are_listed() {
    let (entries, _auth, store) = memory_store();
    let old = Entry::new("old", "u", "p", "");
    let exported = Entry::new("mid", "u", "p", "");
    entries
        .put(
            &legacy_key("old"),
            &envelope::encode_legacy(&old.to_plaintext(), "m1").unwrap(),
        )
        .unwrap();
    entries
        .put(
            &exported.key(),
            &envelope::encode_export(&exported.to_plaintext(), "m1").unwrap(),
        )
        .unwrap();

    let list = store.list_entries("m1").unwrap();
    let found: Vec<&Entry> = list.entries.iter().map(|(_, e)| e).collect();
    assert!(found.contains(&&old));
    assert!(found.contains(&&exported));
}

// ---------------------------------------------------------------------------
// Delete and update
// ---------------------------------------------------------------------------

#[test]
fn delete_also_removes_legacy_record() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("bank", "alice", "p", "")).unwrap();
    entries.put(&legacy_key("bank"), "legacyvalue").unwrap();

    assert!(store.delete("bank", "alice").unwrap());
    assert!(entries.keys().unwrap().is_empty());
}

#[test]
fn delete_reports_legacy_only_removal() {
    let (entries, _auth, store) = memory_store();
    entries.put(&legacy_key("bank"), "legacyvalue").unwrap();
    assert!(store.delete("bank", "nobody").unwrap());
    assert!(!store.delete("bank", "nobody").unwrap());
}

#[test]
fn delete_site_only_touches_legacy_key() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("bank", "alice", "p", "")).unwrap();
    entries.put(&legacy_key("bank"), "legacyvalue").unwrap();

    assert!(store.delete_site("bank").unwrap());
    assert!(store.contains("bank", "alice").unwrap());
    assert!(!entries.contains(&legacy_key("bank")).unwrap());
}

#[test]
fn update_in_place_keeps_key() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("bank", "alice", "p1", "")).unwrap();
    store
        .update("m1", "bank", "alice", &Entry::new("bank", "alice", "p2", "n"))
        .unwrap();

    assert_eq!(entries.keys().unwrap(), vec!["password_bank|alice"]);
    let list = store.list_entries("m1").unwrap();
    assert_eq!(list.entries[0].1, Entry::new("bank", "alice", "p2", "n"));
}

#[test]
fn update_with_rename_removes_old_and_legacy_keys() {
    let (entries, _auth, store) = memory_store();
    store.save("m1", &Entry::new("bank", "alice", "p1", "")).unwrap();
    entries.put(&legacy_key("bank"), "legacyvalue").unwrap();

    store
        .update("m1", "bank", "alice", &Entry::new("bank2", "al", "p1", ""))
        .unwrap();

    assert_eq!(entries.keys().unwrap(), vec!["password_bank2|al"]);
}

// ---------------------------------------------------------------------------
// Re-encrypt all
// ---------------------------------------------------------------------------

#[test]
fn re_encrypt_all_migrates_decodable_and_skips_the_rest() {
    let (entries, auth, store) = memory_store();

    for i in 0..3 {
        store
            .save("old-pass", &Entry::new(format!("v3site{i}"), "u", "p", ""))
            .unwrap();
    }
    let legacy = Entry::new("legacy", "u", "p", "");
    entries
        .put(
            &legacy_key("legacy"),
            &envelope::encode_legacy(&legacy.to_plaintext(), "old-pass").unwrap(),
        )
        .unwrap();
    let v2 = Entry::new("v2site", "u", "p", "");
    entries
        .put(
            &v2.key(),
            &envelope::encode_export(&v2.to_plaintext(), "old-pass").unwrap(),
        )
        .unwrap();
    // Encrypted under some other passphrase: cannot be migrated.
    let foreign = envelope::encode_export(
        &Entry::new("foreign", "u", "p", "").to_plaintext(),
        "someone-else",
    )
    .unwrap();
    entries.put("password_foreign|u", &foreign).unwrap();

    let report = store.re_encrypt_all("old-pass", "new-pass").unwrap();
    assert_eq!(report.migrated.len(), 5);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "password_foreign|u");
    assert_eq!(report.skipped[0].failure, FailureKind::Authentication);
    assert_eq!(report.epoch, 2);

    // Every migrated record is now v3.
    for key in &report.migrated {
        assert!(entries.get(key).unwrap().unwrap().starts_with("v3:"));
    }
    // The skipped record is untouched.
    assert_eq!(
        entries.get("password_foreign|u").unwrap().as_deref(),
        Some(foreign.as_str())
    );

    // Decodable under the new passphrase...
    let under_new = store.list_all("new-pass").unwrap();
    assert_eq!(under_new.len() - under_new.failed_count(), 5);

    // ...and not under the old one, even from a fresh cache.
    let fresh = VaultStore::new(entries.clone(), auth);
    let under_old = fresh.list_all("old-pass").unwrap();
    assert_eq!(under_old.failed_count(), 6);
}

#[test]
fn rotation_keeps_the_master_salt() {
    let (_entries, auth, store) = memory_store();
    store.save("old-pass", &Entry::new("a", "u", "p", "")).unwrap();
    let salt_before = auth.get("master_salt_b64").unwrap();

    store.re_encrypt_all("old-pass", "new-pass").unwrap();
    assert_eq!(auth.get("master_salt_b64").unwrap(), salt_before);
}

#[test]
fn after_rotation_old_passphrase_cannot_write() {
    let (_entries, _auth, store) = memory_store();
    store.save("old-pass", &Entry::new("a", "u", "p", "")).unwrap();
    store.re_encrypt_all("old-pass", "new-pass").unwrap();

    assert!(matches!(
        store.save("old-pass", &Entry::new("b", "u", "p", "")),
        Err(VaultError::StaleEpoch)
    ));
    store.save("new-pass", &Entry::new("b", "u", "p", "")).unwrap();
}

#[test]
fn rotation_with_wrong_old_passphrase_is_refused() {
    let (entries, _auth, store) = memory_store();
    store.save("old-pass", &Entry::new("a", "u", "p", "")).unwrap();
    let before = entries.snapshot().unwrap();

    assert!(matches!(
        store.re_encrypt_all("not-it", "new-pass"),
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(entries.snapshot().unwrap(), before);
    assert_eq!(store.key_cache().snapshot().unwrap().epoch(), 1);
}

#[test]
fn rotation_from_a_fresh_store_checks_the_old_passphrase() {
    let (entries, auth, store) = memory_store();
    store.save("old-pass", &Entry::new("a", "u", "p", "")).unwrap();
    let before = entries.snapshot().unwrap();

    let fresh = VaultStore::new(entries.clone(), auth);
    assert!(matches!(
        fresh.re_encrypt_all("not-it", "new-pass"),
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(entries.snapshot().unwrap(), before);
    assert!(fresh.key_cache().snapshot().is_none());

    // The new passphrase was never installed.
    assert!(matches!(
        fresh.verify_passphrase("new-pass"),
        Err(VaultError::AuthenticationFailed)
    ));

    fresh.re_encrypt_all("old-pass", "new-pass").unwrap();
    assert_eq!(fresh.list_all("new-pass").unwrap().failed_count(), 0);
}

// ---------------------------------------------------------------------------
// Concurrency and reset
// ---------------------------------------------------------------------------

#[test]
fn concurrent_first_use_agrees_on_one_key() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(file_store(dir.path()));

    thread::scope(|s| {
        for i in 0..4 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                store
                    .save("m1", &Entry::new(format!("site{i}"), "u", "p", ""))
                    .unwrap();
            });
        }
    });

    // A fresh process over the same files decodes every entry.
    let reopened = file_store(dir.path());
    let listing = reopened.list_all("m1").unwrap();
    assert_eq!(listing.len(), 4);
    assert_eq!(listing.failed_count(), 0);
}

#[test]
fn reset_clears_entries_salt_and_cache() {
    let (entries, auth, store) = memory_store();
    store.save("m1", &Entry::new("a", "u", "p", "")).unwrap();

    store.reset().unwrap();

    assert!(entries.keys().unwrap().is_empty());
    assert!(auth.keys().unwrap().is_empty());
    assert!(store.key_cache().snapshot().is_none());

    // A different passphrase may now start a new vault.
    store.save("m2", &Entry::new("b", "u", "p", "")).unwrap();
}
