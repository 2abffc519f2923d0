//! `vaultai add` — add or replace an entry.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_passphrase, Cli};
use crate::errors::{VaultError, Result};
use crate::vault::Entry;

/// Execute the `add` command.
pub fn execute(
    cli: &Cli,
    site: &str,
    username: &str,
    password: Option<&str>,
    note: &str,
) -> Result<()> {
    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;

    // Get the entry's password from the argument or an interactive prompt.
    let entry_password = match password {
        Some(p) => Zeroizing::new(p.to_string()),
        None => Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Password for {username} @ {site}"))
                .interact()
                .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?,
        ),
    };

    let entry = Entry::new(site, username, entry_password.as_str(), note);
    entry.validate()?;

    let passphrase = prompt_passphrase()?;
    store.verify_passphrase(&passphrase)?;
    let existed = store.contains(site, username)?;
    store.save(&passphrase, &entry)?;

    if existed {
        output::success(&format!("Updated entry for {username} @ {site}"));
    } else {
        output::success(&format!("Added entry for {username} @ {site}"));
    }

    Ok(())
}
