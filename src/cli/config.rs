// ABOUTME: Configuration management for the stackform application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::template::directory::DEFAULT_MAX_CONCURRENT_RENDERS;
use crate::template::expander::DEFAULT_MAX_ROUNDS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,

    #[serde(default = "default_max_variable_depth")]
    pub max_variable_depth: usize,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub user: String,
    pub home_dir: String,
    pub ssh_key_path: Option<PathBuf>,
    pub ssh_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_max_concurrent_renders() -> usize {
    DEFAULT_MAX_CONCURRENT_RENDERS
}

fn default_max_variable_depth() -> usize {
    DEFAULT_MAX_ROUNDS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_renders: DEFAULT_MAX_CONCURRENT_RENDERS,
            max_variable_depth: DEFAULT_MAX_ROUNDS,
            deploy: DeployConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            user: "deploy".to_string(),
            home_dir: "/home/deploy".to_string(),
            ssh_key_path: None,
            ssh_port: 22,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("stackform.yaml"),
            PathBuf::from("stackform.yml"),
            PathBuf::from(".stackform.yaml"),
            PathBuf::from(".stackform.yml"),
        ];

        if let Some(path) = possible_paths.iter().find(|p| p.exists()) {
            return path.clone();
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".stackform").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // May not exist
        PathBuf::from("stackform.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("STACKFORM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("STACKFORM_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(max_renders) = std::env::var("STACKFORM_MAX_CONCURRENT") {
            self.max_concurrent_renders = max_renders.parse()?;
        }
        if let Ok(depth) = std::env::var("STACKFORM_MAX_VARIABLE_DEPTH") {
            self.max_variable_depth = depth.parse()?;
        }

        if let Ok(user) = std::env::var("STACKFORM_DEPLOY_USER") {
            self.deploy.user = user;
        }
        if let Ok(key_path) = std::env::var("STACKFORM_SSH_KEY") {
            self.deploy.ssh_key_path = Some(PathBuf::from(key_path));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_renders, 4);
        assert_eq!(config.max_variable_depth, 16);
        assert_eq!(config.deploy.user, "deploy");
        assert_eq!(config.deploy.home_dir, "/home/deploy");
        assert_eq!(config.deploy.ssh_port, 22);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("stackform.yaml");
        fs::write(
            &config_path,
            r#"
max_concurrent_renders: 8
deploy:
  user: ops
  home_dir: /srv/ops
  ssh_port: 2222
logging:
  level: debug
  format: compact
"#,
        )
        .unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.max_concurrent_renders, 8);
        assert_eq!(config.max_variable_depth, 16);
        assert_eq!(config.deploy.user, "ops");
        assert_eq!(config.deploy.ssh_port, 2222);
        assert!(config.deploy.ssh_key_path.is_none());
        assert_eq!(config.logging.format, "compact");
    }
}
