use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub selections: HashMap<String, SelectionConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Root directory that receives one timestamped directory per run
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
    /// Combined size of kept log files in MB, 0 for no limit
    #[serde(default = "default_log_max_size_mb")]
    pub log_max_size_mb: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            log_max_size_mb: default_log_max_size_mb(),
        }
    }
}

/// Connection to the remote data API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Instance base URL, e.g. `https://acme.my.salesforce.com`
    pub instance_url: String,

    /// REST API version without the leading `v`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// File holding the bearer access token
    #[serde(default = "default_access_token_file")]
    pub access_token_file: PathBuf,

    /// Per-request timeout applied by the HTTP transport
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Use the queryAll endpoint, which also returns deleted and archived rows
    #[serde(default)]
    pub include_deleted: bool,
}

/// Named set of objects to back up together
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SelectionConfig {
    #[serde(default)]
    pub description: String,

    /// Object names, processed in this order
    #[serde(default)]
    pub objects: Vec<String>,
}

// Default value functions

fn default_output_root() -> PathBuf {
    PathBuf::from("~/backups")
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("~/logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_files() -> u32 {
    10
}

fn default_log_max_size_mb() -> u64 {
    10
}

fn default_api_version() -> String {
    "59.0".to_string()
}

fn default_access_token_file() -> PathBuf {
    PathBuf::from("~/.sf-backup-token")
}

fn default_request_timeout() -> u64 {
    120
}
