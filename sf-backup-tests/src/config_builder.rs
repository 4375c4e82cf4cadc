//! Fluent API for building test configurations
//!
//! Every builder owns a temp directory holding a token file, a log
//! directory and an output root, so built configs pass validation.

use sf_backup::config::{Config, ConnectionConfig, GlobalConfig, SelectionConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    connection: ConnectionConfig,
    selections: HashMap<String, SelectionConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no selections
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let token_file = temp_dir.path().join("access-token");
        fs::write(&token_file, "00Dxx0000000001!test-token\n").expect("Failed to write token file");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let global = GlobalConfig {
            output_root: temp_dir.path().join("backups"),
            log_directory,
            log_level: "debug".to_string(),
            log_max_files: 5,
            log_max_size_mb: 10,
        };

        let connection = ConnectionConfig {
            instance_url: "https://test.my.salesforce.com".to_string(),
            api_version: "59.0".to_string(),
            access_token_file: token_file,
            request_timeout_seconds: 30,
            include_deleted: false,
        };

        Self {
            temp_dir,
            global,
            connection,
            selections: HashMap::new(),
        }
    }

    /// Create a config with a single `core` selection of Account and Contact
    pub fn minimal() -> Self {
        Self::new().add_selection("core", &["Account", "Contact"])
    }

    /// Set the instance URL
    pub fn with_instance_url(mut self, url: &str) -> Self {
        self.connection.instance_url = url.to_string();
        self
    }

    /// Set the API version
    pub fn with_api_version(mut self, version: &str) -> Self {
        self.connection.api_version = version.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.connection.request_timeout_seconds = seconds;
        self
    }

    /// Point at a different token file (which may not exist)
    pub fn with_token_file(mut self, path: &Path) -> Self {
        self.connection.access_token_file = path.to_path_buf();
        self
    }

    /// Use the endpoint that also returns deleted rows
    pub fn include_deleted(mut self) -> Self {
        self.connection.include_deleted = true;
        self
    }

    /// Add a selection
    pub fn add_selection(mut self, name: &str, objects: &[&str]) -> Self {
        self.selections.insert(
            name.to_string(),
            SelectionConfig {
                description: format!("Test selection: {}", name),
                objects: objects.iter().map(|o| o.to_string()).collect(),
            },
        );
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the output root
    pub fn output_root(&self) -> PathBuf {
        self.global.output_root.clone()
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Keep the temp directory (don't delete on drop)
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            connection: self.connection,
            selections: self.selections,
        };
        (config, self.temp_dir)
    }

    /// Serialize the config to `sf-backup.toml` inside the temp directory
    pub fn write(self) -> (Config, PathBuf, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("sf-backup.toml");
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, toml_str).expect("Failed to write config file");
        (config, path, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
