//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! Every `v2` and `v3` envelope ever written was keyed with exactly
//! these parameters, and no envelope records them, so they are fixed
//! constants rather than settings.

use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{VaultError, Result};

/// Length of a KDF salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Length of the derived key in bytes (128 bits, for AES-128).
pub const KEY_LEN: usize = 16;

/// PBKDF2 round count.
pub const PBKDF2_ITERATIONS: u32 = 120_000;

/// A derived AES-128 key that zeroes its memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Derive a 16-byte key from a passphrase and salt.
///
/// Deterministic: the same passphrase + salt always yields the same key,
/// which is what lets us decrypt without ever storing the key.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<MasterKey> {
    let mut bytes = pbkdf2_sha256(passphrase, salt, PBKDF2_ITERATIONS)?;
    let key = MasterKey::new(bytes);
    bytes.zeroize();
    Ok(key)
}

fn pbkdf2_sha256(passphrase: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; KEY_LEN]> {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase, salt, rounds, &mut out)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("PBKDF2 failed: {e}")))?;
    Ok(out)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbkdf2_matches_rfc7914_vector() {
        // RFC 7914 §11: PBKDF2-HMAC-SHA256("passwd", "salt", c = 1).
        let out = pbkdf2_sha256(b"passwd", b"salt", 1).unwrap();
        let expected: [u8; KEY_LEN] = [
            0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f, 0xec, 0x16, 0x91, 0xc2, 0x25, 0x44,
            0xb6, 0x05,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"correct horse", &salt).unwrap();
        let b = derive_key(b"correct horse", &salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salts_give_different_keys() {
        let a = derive_key(b"pw", &[1u8; SALT_LEN]).unwrap();
        let b = derive_key(b"pw", &[2u8; SALT_LEN]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn generated_salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = MasterKey::new([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "MasterKey(..)");
    }
}
