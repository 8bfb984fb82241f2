// ABOUTME: Error types for planning and deploying to a remote host
// ABOUTME: Command failures never carry command text or output that may hold secrets

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Remote command '{label}' failed with exit code {exit_code}")]
    CommandFailed { label: String, exit_code: i32 },

    #[error("Compose reported unset variables:\n{}", .0.join("\n"))]
    MissingComposeVariables(Vec<String>),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Failed to copy to {remote_path}: {reason}")]
    CopyFailed { remote_path: String, reason: String },

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
