// ABOUTME: Error types for template discovery, scanning, expansion and rendering
// ABOUTME: Every fatal condition of the per-file pipeline maps to one variant here

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template render error: {0}")]
    RenderError(String),

    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    #[error("Directory must be relative, was given: '{}'", .0.display())]
    AbsolutePath(PathBuf),

    #[error("Variable expansion exceeded {limit} rounds, still discovering: {pending:?}")]
    ExpansionDepthExceeded { limit: usize, pending: Vec<String> },

    #[error("Failed to read template {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Handlebars error: {0}")]
    HandlebarsError(#[from] handlebars::RenderError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Render worker failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
