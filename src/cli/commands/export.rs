//! `vaultai export` — write every entry to an encrypted export file.
//!
//! The file holds a single `v2` envelope, readable with the master
//! password on any installation.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_passphrase, Cli};
use crate::errors::{VaultError, Result};

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: &str) -> Result<()> {
    let settings = load_settings()?;
    let store = open_store(cli, &settings)?;
    let passphrase = prompt_passphrase()?;

    let dest = Path::new(output_path);

    // Safety: refuse to overwrite the store's own files.
    if dest
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        return Err(VaultError::CommandFailed(
            "refusing to export over a .json file".into(),
        ));
    }

    let report = store.export(&passphrase)?;
    fs::write(dest, report.blob.as_bytes())?;

    for failed in &report.failed {
        output::warning(&format!("Skipped {} ({})", failed.key, failed.failure));
    }
    output::success(&format!(
        "Exported to {}: total {}, exported {}, failed {}",
        dest.display(),
        report.total,
        report.exported,
        report.failed.len()
    ));

    Ok(())
}
