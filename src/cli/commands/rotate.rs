//! `vaultai change-password` — change the master password.
//!
//! Verifies the current password against a stored entry, then
//! re-encrypts every entry under the new password in one commit.
//! Entries that do not decrypt under the current password are left
//! as they are and reported.

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_new_passphrase, prompt_passphrase, Cli};
use crate::errors::{VaultError, Result};

/// Execute the `change-password` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;

    // 1. Get and check the current password.
    output::info("Enter your current master password.");
    let old_passphrase = prompt_passphrase()?;
    store.verify_passphrase(&old_passphrase)?;

    // 2. Prompt for the new password.
    output::info("Choose your new master password.");
    let new_passphrase = prompt_new_passphrase()?;
    if *new_passphrase == *old_passphrase {
        return Err(VaultError::CommandFailed(
            "new password is the same as the current one".into(),
        ));
    }

    // 3. Re-encrypt everything.
    let report = store.re_encrypt_all(&old_passphrase, &new_passphrase)?;

    for skipped in &report.skipped {
        output::warning(&format!(
            "Left {} unchanged ({})",
            skipped.key, skipped.failure
        ));
    }
    output::success(&format!(
        "Master password changed ({} entries re-encrypted, {} skipped)",
        report.migrated.len(),
        report.skipped.len()
    ));

    Ok(())
}
