//! The pre-`v2` scheme: AES-128-CBC with PKCS#7 padding.
//!
//! The key is the passphrase's UTF-8 bytes truncated or zero-padded to
//! 16 bytes, with no KDF.  There is no integrity check: decrypting with
//! the wrong key either trips the padding check or yields garbage.  We
//! keep it only so old records stay readable; nothing writes this scheme
//! during normal operation.

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::errors::{VaultError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Size of the CBC IV in bytes.
pub const IV_LEN: usize = 16;

const KEY_LEN: usize = 16;

/// Build the legacy key from a passphrase.
pub fn legacy_key(passphrase: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let bytes = passphrase.as_bytes();
    let n = bytes.len().min(KEY_LEN);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// Generate a random 16-byte IV.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt with the legacy scheme.
///
/// Used to build migration inputs; the store never emits this format.
pub fn encrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid CBC key/iv: {e}")))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt with the legacy scheme.
///
/// A padding failure is the only error this path can detect; it is
/// reported as `MalformedEnvelope`.  A wrong key that happens to produce
/// valid padding returns garbage bytes.
pub fn decrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
        return Err(VaultError::MalformedEnvelope(format!(
            "legacy ciphertext length {} is not a positive multiple of 16",
            ciphertext.len()
        )));
    }

    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid CBC key/iv: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::MalformedEnvelope("legacy padding check failed".into()))
}
