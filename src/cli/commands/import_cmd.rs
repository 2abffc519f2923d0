//! `vaultai import` — import entries from an encrypted export file.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{load_settings, open_store, prompt_passphrase, Cli};
use crate::errors::{VaultError, Result};
use crate::vault::ImportPolicy;

/// Execute the `import` command.
pub fn execute(cli: &Cli, file_path: &str, policy: Option<&str>) -> Result<()> {
    let source = Path::new(file_path);

    if !source.exists() {
        return Err(VaultError::CommandFailed(format!(
            "import file not found: {}",
            source.display()
        )));
    }

    let settings = load_settings()?;
    let policy: ImportPolicy = match policy {
        Some(p) => p.parse()?,
        None => settings.import_policy,
    };

    let store = open_store(cli, &settings)?;
    let passphrase = prompt_passphrase()?;
    store.verify_passphrase(&passphrase)?;

    // 1. Decrypt the file.
    let blob = fs::read_to_string(source)?;
    let entries = store.read_export(&blob, &passphrase)?;

    if entries.is_empty() {
        output::warning("No entries found in the import file.");
        return Ok(());
    }

    // 2. Preview.
    let preview = store.preview_import(&entries)?;
    output::info(&format!(
        "Total: {}, duplicates: {}, policy: {policy}",
        preview.total, preview.duplicates
    ));

    // 3. Import as one commit.
    let report = store.import(&passphrase, &entries, policy)?;

    output::success(&format!(
        "Imported {}: overwritten {}, skipped {}, rejected {}",
        report.imported, report.overwritten, report.skipped, report.rejected
    ));

    Ok(())
}
