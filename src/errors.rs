use thiserror::Error;

/// All errors that can occur in VaultAI.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed — wrong passphrase or tampered ciphertext")]
    AuthenticationFailed,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Passphrase does not match the active master key")]
    StaleEpoch,

    // --- Entry errors ---
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Entry '{0}' not found")]
    EntryNotFound(String),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Password mismatch — passwords do not match")]
    PasswordMismatch,
}

/// Coarse classification of a failure, used in per-key outcome reports
/// where the full error would be too heavy to carry around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    KeyDerivation,
    Authentication,
    MalformedEnvelope,
    Encryption,
    Storage,
    Other,
}

impl VaultError {
    /// Map this error onto its failure class.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::KeyDerivationFailed(_) => FailureKind::KeyDerivation,
            Self::AuthenticationFailed => FailureKind::Authentication,
            Self::MalformedEnvelope(_) => FailureKind::MalformedEnvelope,
            Self::EncryptionFailed(_) | Self::StaleEpoch => FailureKind::Encryption,
            Self::Storage(_) | Self::Io(_) => FailureKind::Storage,
            _ => FailureKind::Other,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::KeyDerivation => "key derivation",
            Self::Authentication => "authentication",
            Self::MalformedEnvelope => "malformed envelope",
            Self::Encryption => "encryption",
            Self::Storage => "storage",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Convenience type alias for VaultAI results.
pub type Result<T> = std::result::Result<T, VaultError>;
