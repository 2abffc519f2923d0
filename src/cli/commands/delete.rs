//! `vaultai delete` — remove an entry from the vault.

use crate::cli::output;
use crate::cli::{confirm, load_settings, open_store, Cli};
use crate::errors::Result;

/// Execute the `delete` command.
pub fn execute(cli: &Cli, site: &str, username: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Delete entry {username} @ {site}?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;

    // Deleting needs no passphrase: nothing is decrypted.
    if store.delete(site, username)? {
        output::success(&format!("Deleted entry {username} @ {site}"));
    } else {
        output::warning(&format!("No entry for {username} @ {site}"));
    }

    Ok(())
}
