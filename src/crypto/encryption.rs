//! AES-128-GCM authenticated encryption.
//!
//! Callers pass the nonce explicitly because the envelope layouts place
//! it differently (`v3` has it first, `v2` after the salt).  The returned
//! ciphertext always carries the 16-byte tag at its end.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes128Gcm, Nonce};

use crate::errors::{VaultError, Result};

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Generate a fresh random 12-byte nonce from the OS CSPRNG.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
    let mut out = [0u8; NONCE_LEN];
    out.copy_from_slice(&nonce);
    out
}

/// Encrypt `plaintext` with a 16-byte `key` under `nonce`.
///
/// Returns `ciphertext || tag`.
pub fn seal(key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))
}

/// Decrypt `ciphertext || tag` produced by `seal`.
///
/// A tag mismatch (wrong key or modified bytes) is reported as
/// `AuthenticationFailed`; a buffer too short to hold a tag is a
/// structural problem and reported as `MalformedEnvelope`.
pub fn open(key: &[u8], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(VaultError::MalformedEnvelope(format!(
            "ciphertext of {} bytes is shorter than the GCM tag",
            ciphertext.len()
        )));
    }

    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid key length: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [0x11u8; 16];
        let nonce = generate_nonce();
        let ct = seal(&key, &nonce, b"hello").unwrap();
        assert_eq!(ct.len(), 5 + TAG_LEN);
        assert_eq!(open(&key, &nonce, &ct).unwrap(), b"hello");
    }

    #[test]
    fn open_with_wrong_key_is_authentication_failure() {
        let nonce = generate_nonce();
        let ct = seal(&[1u8; 16], &nonce, b"data").unwrap();
        let err = open(&[2u8; 16], &nonce, &ct).unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed));
    }

    #[test]
    fn open_short_buffer_is_malformed() {
        let err = open(&[1u8; 16], &[0u8; NONCE_LEN], &[0u8; 4]).unwrap_err();
        assert!(matches!(err, VaultError::MalformedEnvelope(_)));
    }

    #[test]
    fn seal_rejects_wrong_key_length() {
        let err = seal(&[1u8; 32], &[0u8; NONCE_LEN], b"x").unwrap_err();
        assert!(matches!(err, VaultError::EncryptionFailed(_)));
    }
}
