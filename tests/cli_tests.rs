// ABOUTME: Integration tests for the CLI application
// ABOUTME: Runs the stackform binary end to end against scratch stack files and template trees

mod common;
use common::{stderr, stdout, TestEnvironment, TestStackBuilder};

fn stack() -> TestStackBuilder {
    TestStackBuilder::new("web")
        .with_value("DOMAIN", "example.com")
        .with_value("SSH_PUBLIC_KEY", "ssh-ed25519 AAAA ops@host")
        .with_value("HOST", "app.{{DOMAIN}}")
        .with_secret("SECRET_TOKEN", "tok-123")
}

#[test]
fn test_cli_help_command() {
    let env = TestEnvironment::new();
    let output = env.stackform(&["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("stackform"));
    assert!(text.contains("render"));
    assert!(text.contains("deploy"));
}

#[test]
fn test_cli_scan_lists_variables() {
    let env = TestEnvironment::new();
    let template = env.write_template(
        "site.hbs.conf",
        "server_name {{HOST}};\n{{#if tls}}cert {{[certs:PATH]}};{{/if}}\n",
    );

    let output = env.stackform(&["scan", template.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let names: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(names, vec!["HOST", "certs:PATH", "tls"]);
}

#[test]
fn test_cli_render_writes_output() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    env.write_template("site/nginx.hbs.conf", "server_name {{HOST}};\n");
    env.write_template("site/token.hbs.txt", "{{SECRET_TOKEN}}");

    let output = env.stackform(&[
        "render",
        "site",
        "--stack",
        stack.to_str().unwrap(),
        "--out",
        "out",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("site/nginx.hbs.conf -> site/nginx.conf"));
    assert!(text.contains("site/token.hbs.txt -> site/token.txt (secret)"));
    assert!(!text.contains("tok-123"));
    assert!(!stderr(&output).contains("tok-123"));

    assert_eq!(env.read("out/site/nginx.conf"), "server_name app.example.com;\n");
    assert_eq!(env.read("out/site/token.txt"), "tok-123");
}

#[test]
fn test_cli_render_set_overrides_stack() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    env.write_template("site/nginx.hbs.conf", "server_name {{HOST}};");

    let output = env.stackform(&[
        "render",
        "site",
        "--stack",
        stack.to_str().unwrap(),
        "--set",
        "DOMAIN=example.org",
        "--out",
        "out",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(env.read("out/site/nginx.conf"), "server_name app.example.org;");
}

#[test]
fn test_cli_render_fails_on_missing_value() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    env.write_template("site/good.hbs.txt", "{{DOMAIN}}");
    env.write_template("site/bad.hbs.txt", "{{UNDEFINED_KEY}}");

    let output = env.stackform(&["render", "site", "--stack", stack.to_str().unwrap()]);

    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("site/good.hbs.txt -> site/good.txt"));
    assert!(text.contains("site/bad.hbs.txt"));
    assert!(text.contains("UNDEFINED_KEY"));
}

#[test]
fn test_cli_render_rejects_absolute_directory() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    let absolute = env.path().join("site");

    let output = env.stackform(&[
        "render",
        absolute.to_str().unwrap(),
        "--stack",
        stack.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("must be relative"));
}

#[test]
fn test_cli_plan() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());

    let output = env.stackform(&[
        "plan",
        "--stack",
        stack.to_str().unwrap(),
        "--ipv4",
        "203.0.113.7",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("server_type: cpx11"));
    assert!(text.contains("22/tcp (ssh)"));
    assert!(text.contains("51820/udp"));
    assert!(text.contains("A *.example.com -> 203.0.113.7"));
    assert!(text.contains("fqdn: stack.example.com"));
    assert!(text.contains("web-compose-update"));
}

#[test]
fn test_cli_deploy_dry_run_redacts_secrets() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    env.write_template(
        "web/docker-compose.hbs.yaml",
        "services:\n  web:\n    environment:\n      - TOKEN=${SECRET_TOKEN}\n      - HOST={{HOST}}\n",
    );

    let output = env.stackform(&[
        "deploy",
        "web",
        "--stack",
        stack.to_str().unwrap(),
        "--host",
        "203.0.113.7",
        "--dry-run",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("[run] web-create-dir: mkdir -p /home/deploy/web"));
    assert!(text.contains("[copy] /home/deploy/web/docker-compose.yaml"));
    assert!(text.contains("[run] web-compose-create: [REDACTED]"));
    assert!(!text.contains("tok-123"));
}

#[test]
fn test_cli_deploy_nested_dir_maps_into_stack_path() {
    let env = TestEnvironment::new();
    let stack = env.write_stack(&stack());
    env.write_template("stacks/web/compose.hbs.yaml", "services:\n  web:\n    image: {{HOST}}\n");
    env.write_template("stacks/web/nginx/site.conf", "server {}\n");

    let output = env.stackform(&[
        "deploy",
        "stacks/web",
        "--stack",
        stack.to_str().unwrap(),
        "--host",
        "203.0.113.7",
        "--dry-run",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("[run] web-create-dir: mkdir -p /home/deploy/web /home/deploy/web/nginx"));
    assert!(text.contains("[copy] /home/deploy/web/compose.yaml"));
    assert!(text.contains("[copy] /home/deploy/web/nginx/site.conf"));
    assert!(!text.contains("/home/deploy/stacks"));
}
