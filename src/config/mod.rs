//! Configuration module for sf-backup
//!
//! This module handles loading and validating configuration from TOML files.
//!
//! ## Example Usage
//!
//! ```no_run
//! use sf_backup::config;
//!
//! let config = config::load_config("sf-backup.toml")?;
//! let objects = config::resolve_selection(&config, "core")?;
//!
//! println!("Backing up {:?} into {:?}", objects, config.global.output_root);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_access_token, load_config, resolve_selection, validate_config, ConfigError, Result,
    ACCESS_TOKEN_ENV,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Object names are API identifiers: ASCII letters, digits and underscores,
/// starting with a letter (custom objects end in `__c`).
pub fn is_valid_object_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
