// ABOUTME: Deployment surface for a rendered application stack on a single host
// ABOUTME: Static server/firewall/DNS plans, remote host abstraction and the compose deployment flow

pub mod app;
pub mod error;
pub mod plan;
pub mod remote;

pub use app::{
    check_for_missing_variables, collect_static_files, compose_environment, AppDeployment,
    ComposeAction, DeploymentReport, StaticFile,
};
pub use error::{DeployError, Result};
pub use plan::{
    cloud_init, default_firewall_rules, dns_records, CloudInit, DnsRecord, FirewallRule, Protocol,
    ServerSpec,
};
pub use remote::{CommandOutput, RecordedCall, RecordingHost, RemoteCommand, RemoteHost, SshHost};
