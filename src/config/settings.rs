use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, Result};
use crate::vault::ImportPolicy;

/// Project-level configuration, loaded from `.vaultai.toml`.
///
/// Every field has a sensible default so VaultAI works out-of-the-box
/// without any config file at all.  The PBKDF2 iteration count is not
/// here: no envelope records it, so changing it would orphan data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the namespace files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Threads used to decode entries during export (0 = one per CPU).
    #[serde(default)]
    pub workers: usize,

    /// Conflict policy used by `import` when `--policy` is not given.
    #[serde(default)]
    pub import_policy: ImportPolicy,

    /// `tracing` filter used when neither `VAULTAI_LOG` nor `--verbose`
    /// is set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    ".vaultai".to_string()
}

fn default_log_filter() -> String {
    "vaultai=warn".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            workers: 0,
            import_policy: ImportPolicy::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".vaultai.toml";

    /// Load settings from `<project_dir>/.vaultai.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Directory holding the namespace files.
    ///
    /// Example: `project_dir/.vaultai`
    pub fn data_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
