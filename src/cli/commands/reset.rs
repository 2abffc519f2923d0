//! `vaultai reset` — delete every entry and all key material.

use crate::cli::output;
use crate::cli::{confirm, load_settings, open_store, Cli};
use crate::errors::Result;

/// Execute the `reset` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    if !force && !confirm("Delete ALL entries and the master key material? This cannot be undone")? {
        output::info("Cancelled.");
        return Ok(());
    }

    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;
    store.reset()?;

    output::success("Vault reset");
    Ok(())
}
