//! `vaultai edit` — change an existing entry.
//!
//! Decrypts the current entry, applies the given changes and writes it
//! back.  Renaming the site or username moves the entry to its new key
//! in a single commit.

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_passphrase, Cli};
use crate::errors::{VaultError, Result};
use crate::vault::Entry;

/// Changes requested on the command line.
#[derive(Debug, Default)]
pub struct EntryChanges<'a> {
    pub site: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub note: Option<&'a str>,
}

impl EntryChanges<'_> {
    fn is_empty(&self) -> bool {
        self.site.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.note.is_none()
    }

    fn apply(&self, current: &Entry) -> Entry {
        Entry::new(
            self.site.unwrap_or(&current.site_name),
            self.username.unwrap_or(&current.username),
            self.password.unwrap_or(&current.password),
            self.note.unwrap_or(&current.note),
        )
    }
}

/// Execute the `edit` command.
pub fn execute(cli: &Cli, site: &str, username: &str, changes: &EntryChanges<'_>) -> Result<()> {
    if changes.is_empty() {
        output::info("Nothing to change.");
        output::tip("Pass --new-site, --new-username, --password or --note.");
        return Ok(());
    }

    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;
    let passphrase = prompt_passphrase()?;
    store.verify_passphrase(&passphrase)?;

    // Find the current entry among the ones that decrypt.
    let key = crate::vault::composite_key(site, username);
    let listed = store.list_entries(&passphrase)?;
    let current = match listed.entries.into_iter().find(|(k, _)| *k == key) {
        Some((_, entry)) => entry,
        None if listed.failed.iter().any(|f| f.key == key) => {
            return Err(VaultError::AuthenticationFailed);
        }
        None => {
            return Err(VaultError::EntryNotFound(format!("{username} @ {site}")));
        }
    };

    let updated = changes.apply(&current);
    store.update(&passphrase, site, username, &updated)?;

    output::success(&format!(
        "Updated entry {} @ {}",
        updated.username, updated.site_name
    ));
    Ok(())
}
