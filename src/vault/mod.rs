//! Vault module: encrypted credential storage.
//!
//! This module provides:
//! - The `Entry` type, its plaintext layout and key scheme (`entry`)
//! - Per-key outcome reports for bulk operations (`report`)
//! - Export/import payloads and `ImportPolicy` (`transfer`)
//! - High-level `VaultStore` operations (`store`)

pub mod entry;
pub mod report;
pub mod store;
pub mod transfer;

// Re-export the most commonly used items.
pub use entry::{composite_key, legacy_key, Entry};
pub use report::{
    EntryList, ExportReport, ImportPreview, ImportReport, KeyOutcome, ListedItem, Listing,
    RotationReport,
};
pub use store::VaultStore;
pub use transfer::ImportPolicy;
