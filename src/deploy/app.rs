// ABOUTME: Container stack deployment: remote command strings and the copy-then-compose flow
// ABOUTME: Maps the stack directory onto the remote stack path and checks compose for unset variables

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{DeployError, Result};
use super::remote::{CommandOutput, RemoteCommand, RemoteHost};
use crate::config::VariableResolver;
use crate::shell::{extract_variable_names, stringify_env_for_script, EnvMap};
use crate::template::{
    discover_template_files, is_template_file, TemplateCollection, TemplatePredicate,
};

/// Stderr lines docker compose emits for `${VAR}` references with no value.
pub const MISSING_VARIABLE_MARKER: &str = "variable is not set";

/// Fail if compose output mentions unset variables.
pub fn check_for_missing_variables(stderr: &str) -> Result<()> {
    let missing: Vec<String> = stderr
        .lines()
        .filter(|line| line.contains(MISSING_VARIABLE_MARKER))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DeployError::MissingComposeVariables(missing))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ComposeAction {
    Create,
    Update,
    Delete,
}

/// A non-template file of the stack directory, uploaded as is.
#[derive(Debug, Clone)]
pub struct StaticFile {
    /// Relative to the base directory, like a template path.
    pub relative_path: PathBuf,
    pub content: Vec<u8>,
}

/// Read every non-template file under `dir` (resolved against `base_dir`).
pub async fn collect_static_files(base_dir: &Path, dir: &Path) -> Result<Vec<StaticFile>> {
    let predicate: TemplatePredicate =
        Arc::new(|_: &Path, file_name: &str| !is_template_file(file_name));
    let paths = discover_template_files(base_dir, dir, true, Some(&predicate))?;

    let mut files = Vec::with_capacity(paths.len());
    for relative_path in paths {
        let content = tokio::fs::read(base_dir.join(&relative_path)).await?;
        debug!("Static file {} ({} bytes)", relative_path.display(), content.len());
        files.push(StaticFile {
            relative_path,
            content,
        });
    }
    Ok(files)
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    pub commands: Vec<String>,
    pub copied: Vec<String>,
}

/// A compose stack living in `<home_dir>/<stack_name>` on the remote host.
///
/// Files under `source_dir` land at the same relative path under the remote
/// stack directory.
#[derive(Debug, Clone)]
pub struct AppDeployment {
    pub stack_name: String,
    pub home_dir: String,
    pub source_dir: PathBuf,
    pub environment: EnvMap,
}

impl AppDeployment {
    pub fn new(stack_name: impl Into<String>, home_dir: impl Into<String>) -> Self {
        let stack_name = stack_name.into();
        Self {
            source_dir: PathBuf::from(&stack_name),
            stack_name,
            home_dir: home_dir.into().trim_end_matches('/').to_string(),
            environment: EnvMap::new(),
        }
    }

    /// Local stack directory, relative to the base directory of the render.
    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = without_cur_dir(&source_dir.into());
        self
    }

    pub fn with_environment(mut self, environment: EnvMap) -> Self {
        self.environment = environment;
        self
    }

    pub fn remote_stack_path(&self) -> String {
        format!("{}/{}", self.home_dir, self.stack_name)
    }

    /// Remote destination of a local file: its path below `source_dir`, under
    /// the remote stack directory.
    pub fn remote_path_for(&self, local_path: &Path) -> String {
        let local_path = without_cur_dir(local_path);
        let relative = local_path
            .strip_prefix(&self.source_dir)
            .unwrap_or(&local_path);
        let mut remote = self.remote_stack_path();
        for component in relative.components() {
            remote.push('/');
            remote.push_str(&component.as_os_str().to_string_lossy());
        }
        remote
    }

    /// `mkdir -p` for the stack directory and the parents of `remote_files`.
    pub fn create_dir_command<'a>(
        &self,
        remote_files: impl IntoIterator<Item = &'a str>,
    ) -> RemoteCommand {
        let stack_path = self.remote_stack_path();
        let nested: BTreeSet<&str> = remote_files
            .into_iter()
            .filter_map(|path| path.rsplit_once('/').map(|(parent, _)| parent))
            .filter(|parent| *parent != stack_path)
            .collect();

        let mut command = format!("mkdir -p {}", stack_path);
        for dir in nested {
            command.push(' ');
            command.push_str(dir);
        }
        RemoteCommand::new(format!("{}-create-dir", self.stack_name), command)
    }

    pub fn compose_command(&self, action: ComposeAction) -> RemoteCommand {
        let cd = format!("cd {}", self.remote_stack_path());
        let steps: Vec<&str> = match action {
            ComposeAction::Create => vec![
                cd.as_str(),
                "docker compose pull",
                "docker compose up -d --force-recreate",
            ],
            ComposeAction::Update => vec![
                cd.as_str(),
                "docker compose pull",
                "docker compose down --remove-orphans",
                "docker compose up -d --force-recreate",
                "docker image prune -a -f",
            ],
            ComposeAction::Delete => vec![
                cd.as_str(),
                "docker compose down --remove-orphans",
                "docker image prune -a -f",
            ],
        };
        let chain = steps.join(" && ");

        let label = format!("{}-compose-{:?}", self.stack_name, action).to_lowercase();
        if self.environment.is_empty() {
            return RemoteCommand::new(label, chain);
        }

        let exports = stringify_env_for_script(&self.environment);
        let script = format!("{}\n{}", exports.expose(), chain);
        RemoteCommand {
            label,
            command: exports.with_value(script, false),
        }
    }

    /// `docker compose config` with the stack environment; surfaces unset variables early.
    pub fn compose_check_command(&self) -> RemoteCommand {
        let check = RemoteCommand::new(
            format!("{}-compose-check", self.stack_name),
            "docker compose config --quiet",
        )
        .with_env(&self.environment);
        let text = format!("cd {} && {}", self.remote_stack_path(), check.command.expose());
        RemoteCommand {
            command: check.command.with_value(text, false),
            label: check.label,
        }
    }

    pub fn wait_for_cloud_init_command() -> RemoteCommand {
        RemoteCommand::new("wait-for-cloud-init", "cloud-init status --wait || [ $? -eq 2 ]")
    }

    pub fn reboot_command() -> RemoteCommand {
        RemoteCommand::new("reboot", "sudo reboot")
    }

    /// Wait for first-boot provisioning to finish, then reboot.
    pub async fn initialize_and_reboot(host: &dyn RemoteHost) -> Result<()> {
        run_checked(host, &Self::wait_for_cloud_init_command()).await?;
        host.run(&Self::reboot_command()).await?;
        Ok(())
    }

    /// Copy the stack directory, overlay the rendered files and bring the
    /// compose stack up.
    ///
    /// A rendered file replaces a static file with the same remote path.
    pub async fn deploy(
        &self,
        host: &dyn RemoteHost,
        static_files: &[StaticFile],
        files: &TemplateCollection,
        action: ComposeAction,
    ) -> Result<DeploymentReport> {
        let mut uploads: BTreeMap<String, &[u8]> = BTreeMap::new();
        for file in static_files {
            uploads.insert(self.remote_path_for(&file.relative_path), &file.content);
        }
        for file in files.files.values() {
            uploads.insert(self.remote_path_for(&file.deployed_path), file.content.as_bytes());
        }

        let mut report = DeploymentReport::default();
        info!(
            "Deploying stack '{}' to {} ({} static, {} rendered files)",
            self.stack_name,
            host.address(),
            static_files.len(),
            files.files.len()
        );

        let mkdir = self.create_dir_command(uploads.keys().map(String::as_str));
        run_checked(host, &mkdir).await?;
        report.commands.push(mkdir.label);

        for (remote_path, content) in uploads {
            host.copy(content, &remote_path).await?;
            report.copied.push(remote_path);
        }

        if action != ComposeAction::Delete {
            let check = self.compose_check_command();
            let output = host.run(&check).await?;
            check_for_missing_variables(&output.stderr)?;
            ensure_success(&check, &output)?;
            report.commands.push(check.label);
        }

        let compose = self.compose_command(action);
        let output = host.run(&compose).await?;
        check_for_missing_variables(&output.stderr)?;
        ensure_success(&compose, &output)?;
        report.commands.push(compose.label);

        Ok(report)
    }
}

/// Resolve the `${NAME}` references of rendered files against configuration.
///
/// Only compose files are scanned. Lower-case names and `${NAME:-default}`
/// forms are left to compose; every other name must be configured.
pub fn compose_environment(
    files: &TemplateCollection,
    resolver: &VariableResolver<'_>,
) -> Result<EnvMap> {
    let mut env = EnvMap::new();
    for file in files.files.values() {
        if !is_compose_file(&file.deployed_path) {
            continue;
        }
        for name in extract_variable_names(&file.content) {
            if env.contains_key(&name) {
                continue;
            }
            if let Some(value) = resolver.resolve(&name)? {
                env.insert(name, value);
            }
        }
    }
    Ok(env)
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn is_compose_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains("compose") && (n.ends_with(".yaml") || n.ends_with(".yml")))
        .unwrap_or(false)
}

async fn run_checked(host: &dyn RemoteHost, command: &RemoteCommand) -> Result<CommandOutput> {
    let output = host.run(command).await?;
    ensure_success(command, &output)?;
    Ok(output)
}

fn ensure_success(command: &RemoteCommand, output: &CommandOutput) -> Result<()> {
    if output.success() {
        return Ok(());
    }
    warn!("Remote command '{}' failed", command.label);
    Err(DeployError::CommandFailed {
        label: command.label.clone(),
        exit_code: output.exit_code,
    })
}
