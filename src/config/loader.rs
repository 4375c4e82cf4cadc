use super::types::*;
use super::{expand_tilde, is_valid_object_name};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Environment variable that overrides the token file
pub const ACCESS_TOKEN_ENV: &str = "SF_ACCESS_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Selection '{0}' not found")]
    SelectionNotFound(String),

    #[error("No access token: set {ACCESS_TOKEN_ENV} or write one to {0:?}")]
    MissingToken(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_connection(&config.connection)?;

    for (name, selection) in &config.selections {
        validate_selection(name, selection)?;
    }

    Ok(())
}

fn validate_connection(connection: &ConnectionConfig) -> Result<()> {
    let url = connection.instance_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ConfigError::ValidationError(format!(
            "instance_url must start with http:// or https://: {}",
            connection.instance_url
        )));
    }

    if !is_valid_api_version(&connection.api_version) {
        return Err(ConfigError::ValidationError(format!(
            "api_version must look like '59.0': {}",
            connection.api_version
        )));
    }

    if connection.request_timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "request_timeout_seconds must be greater than zero".to_string(),
        ));
    }

    if std::env::var(ACCESS_TOKEN_ENV).is_err()
        && !expand_tilde(&connection.access_token_file).exists()
    {
        return Err(ConfigError::ValidationError(format!(
            "Access token file does not exist: {:?}",
            connection.access_token_file
        )));
    }

    Ok(())
}

fn validate_selection(name: &str, selection: &SelectionConfig) -> Result<()> {
    if selection.objects.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Selection '{}' has no objects",
            name
        )));
    }

    let mut seen = HashSet::new();
    for object in &selection.objects {
        if !is_valid_object_name(object) {
            return Err(ConfigError::ValidationError(format!(
                "Selection '{}': invalid object name '{}'",
                name, object
            )));
        }
        if !seen.insert(object.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Selection '{}': object '{}' listed more than once",
                name, object
            )));
        }
    }

    Ok(())
}

fn is_valid_api_version(version: &str) -> bool {
    match version.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Get the object list of a named selection
pub fn resolve_selection(config: &Config, name: &str) -> Result<Vec<String>> {
    config
        .selections
        .get(name)
        .map(|s| s.objects.clone())
        .ok_or_else(|| ConfigError::SelectionNotFound(name.to_string()))
}

/// Read the access token from the environment or the configured token file
pub fn load_access_token(connection: &ConnectionConfig) -> Result<String> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    let path = expand_tilde(&connection.access_token_file);
    let token = fs::read_to_string(&path)
        .map_err(|_| ConfigError::MissingToken(path.clone()))?;
    let token = token.trim();

    if token.is_empty() {
        return Err(ConfigError::MissingToken(path));
    }

    Ok(token.to_string())
}
