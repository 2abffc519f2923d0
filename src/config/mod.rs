//! Project configuration (`.vaultai.toml`).

pub mod settings;

pub use settings::Settings;
