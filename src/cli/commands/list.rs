//! `vaultai list` — display all entries in a table.

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_passphrase, Cli};
use crate::errors::Result;
use crate::vault::entry::failure_placeholder;
use crate::vault::Entry;

/// Execute the `list` command.
pub fn execute(cli: &Cli, show_passwords: bool) -> Result<()> {
    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;
    let passphrase = prompt_passphrase()?;

    let listed = store.list_entries(&passphrase)?;
    let entries: Vec<Entry> = listed.entries.into_iter().map(|(_, e)| e).collect();

    output::info(&format!(
        "{} entr{}",
        entries.len() + listed.failed.len(),
        if entries.len() + listed.failed.len() == 1 { "y" } else { "ies" }
    ));

    output::print_entries_table(&entries, show_passwords);

    // Entries that did not decrypt are shown, never hidden.
    for failed in &listed.failed {
        output::warning(&format!(
            "{} ({})",
            failure_placeholder(&failed.key),
            failed.failure
        ));
    }

    Ok(())
}
