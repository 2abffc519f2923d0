//! Plaintext <-> envelope conversion.
//!
//! `encode` always emits `v3` under the shared master key.  `decode`
//! accepts every historical scheme without the caller naming it.

use tracing::debug;

use super::format::Envelope;
use crate::crypto::cache::KeySession;
use crate::crypto::encryption::{self, generate_nonce};
use crate::crypto::kdf::{derive_key, generate_salt, MasterKey};
use crate::crypto::legacy;
use crate::errors::{VaultError, Result};

/// Encrypt `plaintext` as a `v3` envelope under the session's master key.
pub fn encode(plaintext: &str, session: &mut KeySession<'_>) -> Result<String> {
    let key = session.write_key()?;
    seal_v3(plaintext, key.key())
}

/// Encrypt `plaintext` as a `v3` envelope under an explicit master key.
///
/// Rotation uses this to write under a key that is not yet live.
pub fn seal_v3(plaintext: &str, key: &MasterKey) -> Result<String> {
    let nonce = generate_nonce();
    let ciphertext = encryption::seal(key.as_bytes(), &nonce, plaintext.as_bytes())?;
    Ok(Envelope::V3 { nonce, ciphertext }.to_text())
}

/// Encrypt `plaintext` as a self-contained `v2` envelope.
///
/// A fresh salt is generated and the key derived from it, so the result
/// does not depend on this installation's master salt.
pub fn encode_export(plaintext: &str, passphrase: &str) -> Result<String> {
    let salt = generate_salt();
    let key = derive_key(passphrase.as_bytes(), &salt)?;
    let nonce = generate_nonce();
    let ciphertext = encryption::seal(key.as_bytes(), &nonce, plaintext.as_bytes())?;
    Ok(Envelope::V2 {
        salt,
        nonce,
        ciphertext,
    }
    .to_text())
}

/// Encrypt `plaintext` with the legacy CBC scheme.
///
/// Only used to build migration inputs; nothing in the vault writes it.
pub fn encode_legacy(plaintext: &str, passphrase: &str) -> Result<String> {
    let key = legacy::legacy_key(passphrase);
    let iv = legacy::generate_iv();
    let ciphertext = legacy::encrypt(&key, &iv, plaintext.as_bytes())?;
    Ok(Envelope::Legacy { iv, ciphertext }.to_text())
}

/// Decrypt any envelope version back to plaintext.
///
/// `v3` and `v2` failures are detected: a wrong passphrase or modified
/// byte yields `AuthenticationFailed`.  Legacy envelopes carry no
/// integrity check, so a wrong passphrase there yields either a padding
/// failure (`MalformedEnvelope`) or garbled text.
pub fn decode(stored: &str, session: &mut KeySession<'_>) -> Result<String> {
    let envelope = Envelope::parse(stored)?;
    debug!(scheme = %envelope.version(), "decoding envelope");

    match envelope {
        Envelope::V3 { nonce, ciphertext } => {
            let key = session.read_key()?;
            let plaintext = encryption::open(key.key().as_bytes(), &nonce, &ciphertext)?;
            session.confirm();
            into_utf8(plaintext)
        }
        Envelope::V2 {
            salt,
            nonce,
            ciphertext,
        } => {
            let key = derive_key(session.passphrase().as_bytes(), &salt)?;
            let plaintext = encryption::open(key.as_bytes(), &nonce, &ciphertext)?;
            into_utf8(plaintext)
        }
        Envelope::Legacy { iv, ciphertext } => {
            let key = legacy::legacy_key(session.passphrase());
            let plaintext = legacy::decrypt(&key, &iv, &ciphertext)?;
            Ok(String::from_utf8_lossy(&plaintext).into_owned())
        }
    }
}

fn into_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| VaultError::MalformedEnvelope("decrypted payload is not UTF-8".into()))
}
