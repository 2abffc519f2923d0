//! Envelope wire layouts.
//!
//! ```text
//! v3:<base64(nonce[12] || ciphertext || tag[16])>
//! v2:<base64(salt[16] || nonce[12] || ciphertext || tag[16])>
//! <base64(iv[16] || cbc ciphertext)>          (legacy, no prefix)
//! ```
//!
//! The scheme is chosen by the first three characters of the stored
//! text.  Anything without a `v3:` or `v2:` prefix is treated as legacy.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::crypto::encryption::{NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::SALT_LEN;
use crate::crypto::legacy::IV_LEN;
use crate::errors::{VaultError, Result};

const V3_PREFIX: &str = "v3:";
const V2_PREFIX: &str = "v2:";

/// Which scheme produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeVersion {
    V3,
    V2,
    Legacy,
}

impl SchemeVersion {
    /// Identify the scheme from the stored text's prefix alone.
    pub fn detect(stored: &str) -> Self {
        if stored.starts_with(V3_PREFIX) {
            Self::V3
        } else if stored.starts_with(V2_PREFIX) {
            Self::V2
        } else {
            Self::Legacy
        }
    }
}

impl fmt::Display for SchemeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V3 => write!(f, "v3"),
            Self::V2 => write!(f, "v2"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// One parsed envelope.  `ciphertext` includes the GCM tag for the
/// AEAD variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    V3 {
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    },
    V2 {
        salt: [u8; SALT_LEN],
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
    },
    Legacy {
        iv: [u8; IV_LEN],
        ciphertext: Vec<u8>,
    },
}

impl Envelope {
    /// Parse stored text into an envelope.
    ///
    /// Fails with `MalformedEnvelope` on bad base64 or a body too short
    /// for its layout.  Authentication is not checked here.
    pub fn parse(stored: &str) -> Result<Self> {
        if let Some(body) = stored.strip_prefix(V3_PREFIX) {
            let raw = decode_base64(body)?;
            require_len(&raw, NONCE_LEN + TAG_LEN, SchemeVersion::V3)?;
            let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
            return Ok(Self::V3 {
                nonce: to_array(nonce),
                ciphertext: ciphertext.to_vec(),
            });
        }

        if let Some(body) = stored.strip_prefix(V2_PREFIX) {
            let raw = decode_base64(body)?;
            require_len(&raw, SALT_LEN + NONCE_LEN + TAG_LEN, SchemeVersion::V2)?;
            let (salt, rest) = raw.split_at(SALT_LEN);
            let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
            return Ok(Self::V2 {
                salt: to_array(salt),
                nonce: to_array(nonce),
                ciphertext: ciphertext.to_vec(),
            });
        }

        let raw = decode_base64(stored)?;
        // At least one CBC block after the IV.
        require_len(&raw, IV_LEN * 2, SchemeVersion::Legacy)?;
        let (iv, ciphertext) = raw.split_at(IV_LEN);
        Ok(Self::Legacy {
            iv: to_array(iv),
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn version(&self) -> SchemeVersion {
        match self {
            Self::V3 { .. } => SchemeVersion::V3,
            Self::V2 { .. } => SchemeVersion::V2,
            Self::Legacy { .. } => SchemeVersion::Legacy,
        }
    }

    /// Render the envelope as a single line of stored text.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V3 { nonce, ciphertext } => {
                let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                raw.extend_from_slice(nonce);
                raw.extend_from_slice(ciphertext);
                write!(f, "{V3_PREFIX}{}", BASE64.encode(raw))
            }
            Self::V2 {
                salt,
                nonce,
                ciphertext,
            } => {
                let mut raw = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
                raw.extend_from_slice(salt);
                raw.extend_from_slice(nonce);
                raw.extend_from_slice(ciphertext);
                write!(f, "{V2_PREFIX}{}", BASE64.encode(raw))
            }
            Self::Legacy { iv, ciphertext } => {
                let mut raw = Vec::with_capacity(IV_LEN + ciphertext.len());
                raw.extend_from_slice(iv);
                raw.extend_from_slice(ciphertext);
                write!(f, "{}", BASE64.encode(raw))
            }
        }
    }
}

/// Decode standard base64, skipping any ASCII whitespace (line wraps and
/// trailing newlines written by older clients).
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(VaultError::MalformedEnvelope("empty envelope body".into()));
    }
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| VaultError::MalformedEnvelope(format!("invalid base64: {e}")))
}

fn require_len(raw: &[u8], min: usize, version: SchemeVersion) -> Result<()> {
    if raw.len() < min {
        return Err(VaultError::MalformedEnvelope(format!(
            "{version} envelope is {} bytes, need at least {min}",
            raw.len()
        )));
    }
    Ok(())
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
