//! Bulk export/import payloads.
//!
//! An export file is one `v2` envelope wrapping a JSON array:
//!
//! ```json
//! [{"siteName": "...", "username": "...", "password": "...", "note": "..."}]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entry::Entry;
use crate::errors::{VaultError, Result};

/// How an import treats entries whose composite key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPolicy {
    /// Keep what is stored; only add new keys.
    #[default]
    Additive,
    /// Replace stored entries with the imported ones.
    Overwrite,
}

impl FromStr for ImportPolicy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "additive" | "add" => Ok(Self::Additive),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(VaultError::ConfigError(format!(
                "unknown import policy '{other}' (expected 'additive' or 'overwrite')"
            ))),
        }
    }
}

impl fmt::Display for ImportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Additive => write!(f, "additive"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Serialize entries to the export JSON array.
pub fn entries_to_json(entries: &[Entry]) -> Result<String> {
    serde_json::to_string(entries)
        .map_err(|e| VaultError::SerializationError(format!("export payload: {e}")))
}

/// Parse an export JSON array.  Missing fields default to empty strings
/// and surrounding whitespace is dropped.
pub fn entries_from_json(json: &str) -> Result<Vec<Entry>> {
    let entries: Vec<Entry> = serde_json::from_str(json)
        .map_err(|e| VaultError::SerializationError(format!("import payload: {e}")))?;
    Ok(entries.into_iter().map(Entry::trimmed).collect())
}

/// Whether an imported entry carries every required field.
pub fn is_importable(entry: &Entry) -> bool {
    !entry.site_name.is_empty()
        && !entry.username.is_empty()
        && !entry.password.is_empty()
        && entry.validate().is_ok()
}
