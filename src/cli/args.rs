// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for stackform

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::deploy::ComposeAction;

#[derive(Parser)]
#[command(name = "stackform")]
#[command(about = "Render Handlebars template directories from layered stack configuration and deploy them")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the variable names a template references
    Scan {
        #[arg(help = "Path to a template file")]
        file: PathBuf,
    },

    /// Render every template under a directory
    Render {
        #[arg(help = "Template directory, relative to the working directory")]
        dir: PathBuf,

        #[arg(short, long, help = "Path to the stack YAML file")]
        stack: PathBuf,

        #[arg(short, long, help = "Namespace to resolve unqualified keys in (defaults to the project)")]
        namespace: Option<String>,

        #[arg(long = "set", help = "Override configuration values (ns:KEY=value)")]
        sets: Vec<String>,

        #[arg(short = 'D', long = "data", help = "Extra render data (key=value)")]
        data: Vec<String>,

        #[arg(long, help = "Only render templates directly inside DIR")]
        no_recurse: bool,

        #[arg(short, long, help = "Write rendered files under this directory")]
        out: Option<PathBuf>,
    },

    /// Print the server, firewall, DNS and compose plan for a stack
    Plan {
        #[arg(short, long, help = "Path to the stack YAML file")]
        stack: PathBuf,

        #[arg(long, default_value = "DOMAIN", help = "Configuration key holding the domain")]
        domain_key: String,

        #[arg(
            long,
            default_value = "SSH_PUBLIC_KEY",
            help = "Configuration key holding the SSH public key"
        )]
        public_key_key: String,

        #[arg(long, help = "Server IPv4 address for the DNS records")]
        ipv4: Option<String>,
    },

    /// Wait for first-boot provisioning on a host, then reboot it
    Bootstrap {
        #[arg(long, help = "Host address")]
        host: String,

        #[arg(long, help = "Print the remote commands instead of running them")]
        dry_run: bool,
    },

    /// Render a directory and bring it up as a compose stack on a host
    Deploy {
        #[arg(help = "Template directory, relative to the working directory")]
        dir: PathBuf,

        #[arg(short, long, help = "Path to the stack YAML file")]
        stack: PathBuf,

        #[arg(long, help = "Host address")]
        host: String,

        #[arg(short, long, help = "Namespace to resolve unqualified keys in (defaults to the project)")]
        namespace: Option<String>,

        #[arg(long = "set", help = "Override configuration values (ns:KEY=value)")]
        sets: Vec<String>,

        #[arg(long, help = "Remote stack directory name (defaults to the last component of DIR)")]
        stack_name: Option<String>,

        #[arg(long, value_enum, default_value = "create", help = "Compose action to run")]
        action: ComposeAction,

        #[arg(long, help = "Print the remote commands instead of running them")]
        dry_run: bool,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let args = Args::try_parse_from([
            "stackform",
            "render",
            "stack",
            "--stack",
            "stack.yaml",
            "--set",
            "pangolin:DOMAIN=example.com",
            "--set",
            "EMAIL=ops@example.com",
            "-D",
            "tier=prod",
            "--no-recurse",
        ])
        .unwrap();

        match args.command {
            Commands::Render {
                dir,
                sets,
                data,
                no_recurse,
                out,
                ..
            } => {
                assert_eq!(dir, PathBuf::from("stack"));
                assert_eq!(sets.len(), 2);
                assert_eq!(data, vec!["tier=prod".to_string()]);
                assert!(no_recurse);
                assert!(out.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_deploy_action() {
        let args = Args::try_parse_from([
            "stackform",
            "--verbose",
            "deploy",
            "pangolin",
            "--stack",
            "stack.yaml",
            "--host",
            "203.0.113.7",
            "--action",
            "update",
            "--dry-run",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Deploy {
                action, dry_run, ..
            } => {
                assert_eq!(action, ComposeAction::Update);
                assert!(dry_run);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_render_requires_stack() {
        assert!(Args::try_parse_from(["stackform", "render", "stack"]).is_err());
    }
}
