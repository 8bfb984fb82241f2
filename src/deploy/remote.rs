// ABOUTME: Remote host abstraction for running commands and copying files
// ABOUTME: SshHost shells out to the ssh client; RecordingHost records calls for dry runs and tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::{DeployError, Result};
use crate::config::ResolvedValue;
use crate::shell::{stringify_env_for_command, EnvMap};

/// A shell command for a remote host. The command text may hold secrets.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    pub label: String,
    pub command: ResolvedValue,
}

impl RemoteCommand {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: ResolvedValue::plain(command),
        }
    }

    /// Prefix the command with `NAME="value"` assignments.
    pub fn with_env(self, env: &EnvMap) -> Self {
        if env.is_empty() {
            return self;
        }
        let prefix = stringify_env_for_command(env);
        let text = format!("{} {}", prefix.expose(), self.command.expose());
        Self {
            command: self.command.with_value(text, prefix.is_secret()),
            label: self.label,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait RemoteHost: Send + Sync {
    fn address(&self) -> &str;

    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput>;

    async fn copy(&self, content: &[u8], remote_path: &str) -> Result<()>;
}

/// Single-quote a string for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Host reached through the system `ssh` client in batch mode.
#[derive(Debug, Clone)]
pub struct SshHost {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_path: Option<PathBuf>,
}

impl SshHost {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: 22,
            key_path: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    fn ssh_command(&self, remote: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p").arg(self.port.to_string());
        if let Some(ref key_path) = self.key_path {
            cmd.arg("-i").arg(key_path);
        }
        cmd.args(["-o", "BatchMode=yes", "-o", "StrictHostKeyChecking=accept-new"]);
        cmd.arg(format!("{}@{}", self.user, self.host));
        cmd.arg(remote);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl RemoteHost for SshHost {
    fn address(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        info!("Running '{}' on {}", command.label, self.host);
        let output = self.ssh_command(command.command.expose()).output().await?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!("'{}' exited with {}", command.label, result.exit_code);
        Ok(result)
    }

    async fn copy(&self, content: &[u8], remote_path: &str) -> Result<()> {
        info!("Copying {} bytes to {}:{}", content.len(), self.host, remote_path);
        let remote = format!("cat > {}", shell_quote(remote_path));
        let mut child = self.ssh_command(&remote).stdin(Stdio::piped()).spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(content).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(DeployError::CopyFailed {
                remote_path: remote_path.to_string(),
                reason: format!("ssh exited with {}", output.status.code().unwrap_or(-1)),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum RecordedCall {
    Run { label: String, command: ResolvedValue },
    Copy { remote_path: String, bytes: usize },
}

/// Dry-run host: records every call and answers with canned outputs.
#[derive(Debug, Default)]
pub struct RecordingHost {
    address: String,
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingHost {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Answer runs with this label with `output` instead of an empty success.
    pub fn with_response(mut self, label: &str, output: CommandOutput) -> Self {
        self.responses.insert(label.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: RecordedCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl RemoteHost for RecordingHost {
    fn address(&self) -> &str {
        &self.address
    }

    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        debug!("[dry-run] {}", command.label);
        self.record(RecordedCall::Run {
            label: command.label.clone(),
            command: command.command.clone(),
        });
        Ok(self
            .responses
            .get(&command.label)
            .cloned()
            .unwrap_or_default())
    }

    async fn copy(&self, content: &[u8], remote_path: &str) -> Result<()> {
        debug!("[dry-run] copy to {}", remote_path);
        self.record(RecordedCall::Copy {
            remote_path: remote_path.to_string(),
            bytes: content.len(),
        });
        Ok(())
    }
}
