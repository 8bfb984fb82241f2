// ABOUTME: Main application orchestration for the stackform CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands::{self, RenderRequest};
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so rendered output on stdout stays clean.
        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting stackform v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Scan { file } => commands::scan_template(file).await,

            Commands::Render {
                dir,
                stack,
                namespace,
                sets,
                data,
                no_recurse,
                out,
            } => {
                let request = RenderRequest {
                    dir,
                    stack,
                    namespace,
                    sets,
                    data,
                    recursive: !no_recurse,
                };
                commands::render_templates(request, out, &self.config).await
            }

            Commands::Plan {
                stack,
                domain_key,
                public_key_key,
                ipv4,
            } => commands::plan_stack(stack, domain_key, public_key_key, ipv4, &self.config).await,

            Commands::Bootstrap { host, dry_run } => {
                commands::bootstrap_host(host, dry_run, &self.config).await
            }

            Commands::Deploy {
                dir,
                stack,
                host,
                namespace,
                sets,
                stack_name,
                action,
                dry_run,
            } => {
                let request = RenderRequest {
                    dir,
                    stack,
                    namespace,
                    sets,
                    data: Vec::new(),
                    recursive: true,
                };
                commands::deploy_stack(request, host, stack_name, action, dry_run, &self.config)
                    .await
            }
        }
    }

    /// Parse command line arguments and load configuration
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert_eq!(app.config().max_concurrent_renders, 4);
    }

    #[test]
    fn test_app_with_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("stackform.yaml");
        fs::write(&config_path, "max_variable_depth: 4\n").unwrap();

        let app = App::new(Config::load(Some(config_path)).unwrap());
        assert_eq!(app.config().max_variable_depth, 4);
        assert_eq!(app.config().deploy.user, "deploy");
    }
}
