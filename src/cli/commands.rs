// ABOUTME: Command implementations for the stackform CLI
// ABOUTME: Handles execution of scan, render, plan, bootstrap and deploy commands

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::Config;
use crate::config::{ConfigLayer, ConfigStore, VariableResolver};
use crate::deploy::{
    cloud_init, collect_static_files, compose_environment, default_firewall_rules, dns_records,
    AppDeployment, ComposeAction, RecordedCall, RecordingHost, RemoteHost, ServerSpec, SshHost,
};
use crate::template::{
    discover_variables, DirectoryOptions, TemplateCollection, TemplateContext, TemplateDirectory,
    TemplateEngine, TemplateProcessor,
};

const REDACTED: &str = "[REDACTED]";

/// Print the variable names referenced by one template file
pub async fn scan_template(file: PathBuf) -> Result<()> {
    info!("Scanning template: {}", file.display());

    let content = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| anyhow!("Failed to read template '{}': {}", file.display(), e))?;
    let names = discover_variables(&content)?;

    for name in &names {
        println!("{}", name);
    }
    info!("Found {} variables", names.len());
    Ok(())
}

/// Options shared by the commands that render a template directory
pub struct RenderRequest {
    pub dir: PathBuf,
    pub stack: PathBuf,
    pub namespace: Option<String>,
    pub sets: Vec<String>,
    pub data: Vec<String>,
    pub recursive: bool,
}

/// Render a directory and optionally write the results
pub async fn render_templates(
    request: RenderRequest,
    out: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let store = load_store(&request.stack, &request.sets)?;
    let (collection, namespace) = render_directory(&request, Arc::new(store), config).await?;

    print_collection(&collection);

    if let Some(out_dir) = out {
        let written = collection.write_to(&out_dir).await?;
        info!("Wrote {} files to {}", written.len(), out_dir.display());
    }

    if !collection.is_success() {
        return Err(anyhow!(
            "{} of {} templates failed to render in namespace '{}'",
            collection.failures.len(),
            collection.len(),
            namespace
        ));
    }
    Ok(())
}

/// Print the static infrastructure plan for a stack
pub async fn plan_stack(
    stack: PathBuf,
    domain_key: String,
    public_key_key: String,
    ipv4: Option<String>,
    config: &Config,
) -> Result<()> {
    let store = load_store(&stack, &[])?;
    let project = store.default_config();
    let domain = project.require(&domain_key)?;
    let public_key = project.require(&public_key_key)?;

    println!("Server:");
    print!("{}", indent(&serde_yaml::to_string(&ServerSpec::default())?));

    println!("Firewall:");
    for rule in default_firewall_rules() {
        println!(
            "  {}/{} ({}) from {}",
            rule.port,
            rule.protocol,
            rule.description,
            rule.source_ips.join(", ")
        );
    }

    println!("DNS:");
    match ipv4 {
        Some(address) => {
            for record in dns_records(domain.expose(), &address)? {
                let name = match record.subdomain {
                    Some(ref sub) => format!("{}.{}", sub, record.domain),
                    None => record.domain.clone(),
                };
                println!("  {} {} -> {}", record.record_type, name, record.content);
            }
        }
        None => {
            println!("  A {} -> <server ipv4>", domain.expose());
            println!("  A *.{} -> <server ipv4>", domain.expose());
        }
    }

    let engine = TemplateEngine::new();
    let document = cloud_init(&engine, &config.deploy.user, &public_key, &domain)?;
    println!("Cloud-init:");
    if document.is_secret() {
        println!("  {} ({} bytes)", REDACTED, document.expose().len());
    } else {
        print!("{}", indent(document.expose()));
    }

    println!("Compose:");
    let deployment = AppDeployment::new(project.name(), &config.deploy.home_dir);
    for action in [ComposeAction::Create, ComposeAction::Update, ComposeAction::Delete] {
        let command = deployment.compose_command(action);
        println!("  {}: {}", command.label, command.command.expose());
    }

    Ok(())
}

/// Wait for cloud-init on a fresh host, then reboot it
pub async fn bootstrap_host(host: String, dry_run: bool, config: &Config) -> Result<()> {
    if dry_run {
        let recorder = RecordingHost::new(&host);
        AppDeployment::initialize_and_reboot(&recorder).await?;
        print_recorded_calls(&recorder);
        return Ok(());
    }

    let remote = connect(&host, config);
    AppDeployment::initialize_and_reboot(remote.as_ref()).await?;
    info!("Host {} initialized and rebooting", host);
    Ok(())
}

/// Render a directory and deploy it as a compose stack
pub async fn deploy_stack(
    request: RenderRequest,
    host: String,
    stack_name: Option<String>,
    action: ComposeAction,
    dry_run: bool,
    config: &Config,
) -> Result<()> {
    let stack_name = match stack_name {
        Some(name) => name,
        None => request
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Cannot derive a stack name from '{}'", request.dir.display()))?,
    };

    let store = Arc::new(load_store(&request.stack, &request.sets)?);
    let (collection, namespace) = render_directory(&request, Arc::clone(&store), config).await?;
    print_collection(&collection);
    if !collection.is_success() {
        return Err(anyhow!(
            "Not deploying '{}': {} templates failed to render",
            stack_name,
            collection.failures.len()
        ));
    }

    let engine = TemplateEngine::new();
    let resolver = VariableResolver::new(&store, &namespace, engine.ignored_names());
    let environment = compose_environment(&collection, &resolver)?;
    info!("Compose environment has {} variables", environment.len());

    let static_files = collect_static_files(Path::new("."), &request.dir).await?;
    info!("Stack directory has {} static files", static_files.len());

    let deployment = AppDeployment::new(stack_name, &config.deploy.home_dir)
        .with_source_dir(&request.dir)
        .with_environment(environment);

    if dry_run {
        let recorder = RecordingHost::new(host);
        let report = deployment
            .deploy(&recorder, &static_files, &collection, action)
            .await?;
        print_recorded_calls(&recorder);
        info!("Dry run complete: {} commands", report.commands.len());
        return Ok(());
    }

    let remote = connect(&host, config);
    let report = deployment
        .deploy(remote.as_ref(), &static_files, &collection, action)
        .await?;
    println!(
        "Deployed '{}' to {}: {} files copied, {} commands run",
        deployment.stack_name,
        host,
        report.copied.len(),
        report.commands.len()
    );
    Ok(())
}

fn load_store(stack: &Path, sets: &[String]) -> Result<ConfigStore> {
    let mut store = ConfigStore::load_stack_file(stack)?;
    if !sets.is_empty() {
        let layer = ConfigLayer::from_assignments("command line", store.default_namespace(), sets)?;
        store.push_layer(layer);
    }
    Ok(store)
}

async fn render_directory(
    request: &RenderRequest,
    store: Arc<ConfigStore>,
    config: &Config,
) -> Result<(TemplateCollection, String)> {
    let namespace = request
        .namespace
        .clone()
        .unwrap_or_else(|| store.default_namespace().to_string());

    let mut data = TemplateContext::for_run()?;
    data.extend(&TemplateContext::from_pairs(&request.data)?);

    let processor = TemplateProcessor::new(Arc::new(TemplateEngine::new()), store)
        .with_namespace(&namespace)
        .with_max_rounds(config.max_variable_depth);
    let directory =
        TemplateDirectory::with_max_concurrent(Arc::new(processor), config.max_concurrent_renders);

    let options = DirectoryOptions {
        recursive: request.recursive,
        data: Some(data),
        ..DirectoryOptions::default()
    };
    let collection = directory.render(&request.dir, &options).await?;
    Ok((collection, namespace))
}

fn connect(host: &str, config: &Config) -> Box<dyn RemoteHost> {
    Box::new(
        SshHost::new(host, &config.deploy.user)
            .with_port(config.deploy.ssh_port)
            .with_key_path(config.deploy.ssh_key_path.clone()),
    )
}

fn print_collection(collection: &TemplateCollection) {
    for file in collection.files.values() {
        let marker = if file.secret { " (secret)" } else { "" };
        println!(
            "✓ {} -> {}{}",
            file.template_path.display(),
            file.deployed_path.display(),
            marker
        );
    }
    for (path, err) in &collection.failures {
        warn!("Template {} failed", path.display());
        println!("✗ {}: {}", path.display(), err);
    }
}

fn print_recorded_calls(recorder: &RecordingHost) {
    for call in recorder.calls() {
        match call {
            RecordedCall::Run { label, command } => {
                let text = if command.is_secret() {
                    REDACTED
                } else {
                    command.expose()
                };
                println!("[run] {}: {}", label, text);
            }
            RecordedCall::Copy { remote_path, bytes } => {
                println!("[copy] {} ({} bytes)", remote_path, bytes);
            }
        }
    }
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {}\n", line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent() {
        assert_eq!(indent("a: 1\nb: 2\n"), "  a: 1\n  b: 2\n");
    }

    #[test]
    fn test_load_store_applies_overrides() {
        let temp = tempfile::tempdir().unwrap();
        let stack = temp.path().join("stack.yaml");
        std::fs::write(
            &stack,
            "project: web\nconfig:\n  DOMAIN: example.com\n  db:PASSWORD: hunter2\n",
        )
        .unwrap();

        let store = load_store(
            &stack,
            &["DOMAIN=override.example.com".to_string(), "db:SECRET_TOKEN=t".to_string()],
        )
        .unwrap();

        let web = store.default_config();
        assert_eq!(web.require("DOMAIN").unwrap().expose(), "override.example.com");
        assert_eq!(web.sibling("db").require("PASSWORD").unwrap().expose(), "hunter2");
        assert!(web.sibling("db").get("SECRET_TOKEN").unwrap().is_secret());
    }
}
