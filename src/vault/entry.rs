//! The `Entry` type and its canonical plaintext form.
//!
//! Each entry is encrypted as a labelled block of text:
//!
//! ```text
//! 网站: <site>
//! 用户名: <username>
//! 密码: <password>
//! 备注: <note>
//! ------------------------
//! ```
//!
//! The line order is fixed.  Stored data written by other clients uses
//! the same layout, so it must not change.

use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, Result};

/// Prefix shared by every entry key in the entry namespace.
pub const KEY_PREFIX: &str = "password_";

/// Separator between site and username inside a composite key.
pub const KEY_SEPARATOR: char = '|';

const SITE_LABEL: &str = "网站:";
const USERNAME_LABEL: &str = "用户名:";
const PASSWORD_LABEL: &str = "密码:";
const NOTE_LABEL: &str = "备注:";
const DIVIDER: &str = "------------------------";

/// One stored credential.
///
/// Serialized with camelCase names, matching the export file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entry {
    pub site_name: String,
    pub username: String,
    pub password: String,
    pub note: String,
}

impl Entry {
    pub fn new(
        site_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            username: username.into(),
            password: password.into(),
            note: note.into(),
        }
        .trimmed()
    }

    /// Strip surrounding whitespace from every field, the form `parse`
    /// gives back.
    pub fn trimmed(self) -> Self {
        Self {
            site_name: self.site_name.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.trim().to_string(),
            note: self.note.trim().to_string(),
        }
    }

    /// The storage key for this entry.
    pub fn key(&self) -> String {
        composite_key(&self.site_name, &self.username)
    }

    /// Check that the entry can be stored and parsed back unchanged.
    ///
    /// - The site must not contain `|`, so the composite key splits
    ///   unambiguously at its first separator.
    /// - Site, username and password must be single lines.
    /// - No field may carry surrounding whitespace.
    /// - The note must not contain a divider line or carriage returns.
    pub fn validate(&self) -> Result<()> {
        if self.site_name.contains(KEY_SEPARATOR) {
            return Err(VaultError::InvalidEntry(format!(
                "site '{}' must not contain '{KEY_SEPARATOR}'",
                self.site_name
            )));
        }
        for (field, value) in [
            ("site", &self.site_name),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.contains(['\n', '\r']) {
                return Err(VaultError::InvalidEntry(format!(
                    "{field} must not contain line breaks"
                )));
            }
        }
        for (field, value) in [
            ("site", &self.site_name),
            ("username", &self.username),
            ("password", &self.password),
            ("note", &self.note),
        ] {
            if value.trim() != value.as_str() {
                return Err(VaultError::InvalidEntry(format!(
                    "{field} must not start or end with whitespace"
                )));
            }
        }
        if self.note.contains('\r') || self.note.split('\n').any(|line| line == DIVIDER) {
            return Err(VaultError::InvalidEntry(
                "note must not contain carriage returns or a divider line".into(),
            ));
        }
        Ok(())
    }

    /// Render the canonical plaintext block.
    pub fn to_plaintext(&self) -> String {
        format!(
            "{SITE_LABEL} {}\n{USERNAME_LABEL} {}\n{PASSWORD_LABEL} {}\n{NOTE_LABEL} {}\n{DIVIDER}",
            self.site_name, self.username, self.password, self.note
        )
    }

    /// Parse a decrypted plaintext block.
    ///
    /// Labels are stripped and values trimmed.  The note line and the
    /// divider are optional; a note may span several lines.
    pub fn parse(plaintext: &str) -> Result<Self> {
        let mut lines = plaintext.split('\n').map(|l| l.trim_end_matches('\r'));

        let site_name = labelled(lines.next(), SITE_LABEL)?;
        let username = labelled(lines.next(), USERNAME_LABEL)?;
        let password = labelled(lines.next(), PASSWORD_LABEL)?;

        let mut note_lines: Vec<&str> = Vec::new();
        if let Some(first) = lines.next() {
            if let Some(rest) = first.strip_prefix(NOTE_LABEL) {
                note_lines.push(rest);
                for line in lines.by_ref() {
                    if line == DIVIDER {
                        break;
                    }
                    note_lines.push(line);
                }
            }
        }

        Ok(Self {
            site_name,
            username,
            password,
            note: note_lines.join("\n").trim().to_string(),
        })
    }
}

fn labelled(line: Option<&str>, label: &str) -> Result<String> {
    line.and_then(|l| l.strip_prefix(label))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| VaultError::InvalidEntry(format!("missing '{label}' line")))
}

/// `password_<site>|<username>`.
pub fn composite_key(site: &str, username: &str) -> String {
    format!("{KEY_PREFIX}{site}{KEY_SEPARATOR}{username}")
}

/// `password_<site>`: the single-field key used before usernames were
/// part of the identity.
pub fn legacy_key(site: &str) -> String {
    format!("{KEY_PREFIX}{site}")
}

/// What a stored key identifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIdentity<'a> {
    Composite { site: &'a str, username: &'a str },
    Legacy { site: &'a str },
}

/// Split an entry-namespace key.  Returns `None` for keys without the
/// entry prefix.
pub fn split_key(key: &str) -> Option<KeyIdentity<'_>> {
    let rest = key.strip_prefix(KEY_PREFIX)?;
    Some(match rest.split_once(KEY_SEPARATOR) {
        Some((site, username)) => KeyIdentity::Composite { site, username },
        None => KeyIdentity::Legacy { site: rest },
    })
}

/// The text shown in place of an entry that could not be decrypted.
pub fn failure_placeholder(key: &str) -> String {
    let label = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
    format!("【解密失败】网站: {label}")
}
