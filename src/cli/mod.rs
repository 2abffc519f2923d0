//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{VaultError, Result};
use crate::storage::{FileStore, AUTH_NAMESPACE, ENTRY_NAMESPACE};
use crate::vault::VaultStore;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable holding the master passphrase.
pub const PASSWORD_ENV: &str = "VAULTAI_PASSWORD";

/// Environment variable holding the new passphrase for `change-password`.
pub const NEW_PASSWORD_ENV: &str = "VAULTAI_NEW_PASSWORD";

/// VaultAI CLI: encrypted password manager.
#[derive(Parser)]
#[command(name = "vaultai", about = "Encrypted password manager", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: from .vaultai.toml, else .vaultai)
    #[arg(long, env = "VAULTAI_DATA_DIR", global = true)]
    pub data_dir: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Add or replace an entry
    Add {
        /// Site name
        site: String,
        /// Username on that site
        username: String,
        /// Password (omit for interactive prompt)
        password: Option<String>,
        /// Free-form note
        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Change an existing entry, optionally renaming it
    Edit {
        /// Current site name
        site: String,
        /// Current username
        username: String,
        /// New site name
        #[arg(long)]
        new_site: Option<String>,
        /// New username
        #[arg(long)]
        new_username: Option<String>,
        /// New password
        #[arg(long)]
        password: Option<String>,
        /// New note
        #[arg(long)]
        note: Option<String>,
    },

    /// List all entries
    List {
        /// Show passwords in clear text
        #[arg(long)]
        show_passwords: bool,
    },

    /// Delete an entry (and any legacy record for its site)
    Delete {
        /// Site name
        site: String,
        /// Username
        username: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the master password, re-encrypting every entry
    ChangePassword,

    /// Export all entries to an encrypted file
    Export {
        /// Output file path
        #[arg(short, long, default_value = "vault_export.dat")]
        output: String,
    },

    /// Import entries from an encrypted export file
    Import {
        /// Path to the export file
        file: String,
        /// Conflict policy: additive (default) or overwrite
        #[arg(short, long)]
        policy: Option<String>,
    },

    /// Delete every entry and all key material
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the master passphrase, trying in order:
/// 1. `VAULTAI_PASSWORD` env var (scripts/CI)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter master password")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new master passphrase with confirmation.
///
/// Also respects `VAULTAI_NEW_PASSWORD` for scripted usage.
/// Enforces a minimum password length.
pub fn prompt_new_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password(NEW_PASSWORD_ENV) {
        if pw.chars().count() < MIN_PASSWORD_LEN {
            return Err(VaultError::CommandFailed(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose new master password")
            .with_confirmation(
                "Confirm new master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

fn env_password(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Ask a yes/no question, defaulting to "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))
}

/// Load `.vaultai.toml` from the current directory.
pub fn load_settings() -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    Settings::load(&cwd)
}

/// Resolve the data directory: `--data-dir` wins over the config file.
///
/// Example: `<cwd>/.vaultai`
pub fn data_dir(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match &cli.data_dir {
        Some(dir) => cwd.join(dir),
        None => settings.data_path(&cwd),
    })
}

/// Open both namespaces under the data directory and build a store.
pub fn open_store(cli: &Cli, settings: &Settings) -> Result<VaultStore> {
    let dir = data_dir(cli, settings)?;
    let entries = FileStore::open_namespace(&dir, ENTRY_NAMESPACE)?;
    let auth = FileStore::open_namespace(&dir, AUTH_NAMESPACE)?;
    Ok(VaultStore::new(Arc::new(entries), Arc::new(auth)).with_workers(settings.workers))
}
