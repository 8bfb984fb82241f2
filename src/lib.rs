// ABOUTME: Main library module for stackform
// ABOUTME: Exports configuration, templating, shell and deployment modules plus the CLI

pub mod cli;
pub mod config;
pub mod deploy;
pub mod shell;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use config::{ConfigError, ConfigStore, ResolvedValue};
pub use deploy::{AppDeployment, DeployError};
pub use template::{TemplateDirectory, TemplateEngine, TemplateError, TemplateProcessor};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
