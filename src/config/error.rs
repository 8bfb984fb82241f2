// ABOUTME: Error types for configuration loading and lookup
// ABOUTME: Covers missing required keys, namespace navigation and stack file parsing

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value '{key}' in namespace '{namespace}'")]
    MissingRequiredValue { namespace: String, key: String },

    #[error("Tried to access parent of root namespace: '{0}'")]
    ParentOfRootNamespace(String),

    #[error("Invalid configuration key '{0}'")]
    InvalidKey(String),

    #[error("Unsupported value for configuration key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to read stack file {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
