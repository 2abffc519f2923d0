//! Per-key outcome reports for bulk operations.
//!
//! Bulk operations never swallow a failure: every key ends up either in
//! the success column or with its `FailureKind` recorded here.

use crate::errors::FailureKind;

use super::entry::{failure_placeholder, Entry};

/// The outcome for one stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub key: String,
    pub failure: FailureKind,
}

/// One item of a listing: decoded plaintext, or why it could not be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub key: String,
    pub result: std::result::Result<String, FailureKind>,
}

impl ListedItem {
    /// The decoded plaintext, or a visible placeholder naming the key.
    pub fn text(&self) -> String {
        match &self.result {
            Ok(plaintext) => plaintext.clone(),
            Err(_) => failure_placeholder(&self.key),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The result of `VaultStore::list_all`, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<ListedItem>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plaintexts and placeholders, one per stored entry.
    pub fn texts(&self) -> Vec<String> {
        self.items.iter().map(ListedItem::text).collect()
    }

    /// Keys that failed to decode, with the reason.
    pub fn failures(&self) -> Vec<KeyOutcome> {
        self.items
            .iter()
            .filter_map(|item| {
                item.result.as_ref().err().map(|kind| KeyOutcome {
                    key: item.key.clone(),
                    failure: *kind,
                })
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_ok()).count()
    }
}

/// Decoded entries plus the keys that could not be turned into one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryList {
    /// `(key, entry)` pairs in key order.
    pub entries: Vec<(String, Entry)>,
    pub failed: Vec<KeyOutcome>,
}

/// The result of a passphrase rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Keys re-encrypted under the new passphrase.
    pub migrated: Vec<String>,
    /// Keys left untouched because they did not decode.
    pub skipped: Vec<KeyOutcome>,
    /// Epoch of the master key installed for the new passphrase.
    pub epoch: u64,
}

/// The result of building an export blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// The `v2` envelope holding the JSON array.
    pub blob: String,
    pub total: usize,
    pub exported: usize,
    pub failed: Vec<KeyOutcome>,
}

/// What an import would do, computed before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPreview {
    pub total: usize,
    /// Entries whose composite key already exists.
    pub duplicates: usize,
}

/// The result of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub overwritten: usize,
    pub skipped: usize,
    /// Entries refused because a required field was empty or invalid.
    pub rejected: usize,
}
