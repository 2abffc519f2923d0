//! Cryptographic primitives for VaultAI.
//!
//! This module provides:
//! - AES-128-GCM encryption and decryption (`encryption`)
//! - PBKDF2-HMAC-SHA256 key derivation (`kdf`)
//! - The read-only AES-128-CBC legacy scheme (`legacy`)
//! - The shared master-key cache (`cache`)

pub mod cache;
pub mod encryption;
pub mod kdf;
pub mod legacy;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, derive_key, KeyCache, ...};
pub use cache::{KeyCache, KeyEpoch, KeySession};
pub use encryption::{generate_nonce, open, seal};
pub use kdf::{derive_key, generate_salt, MasterKey};
