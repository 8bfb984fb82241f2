// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Builds scratch stack files and template trees and runs the stackform binary against them

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub struct TestStackBuilder {
    project: String,
    entries: Vec<(String, String, bool)>,
}

impl TestStackBuilder {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            entries: Vec::new(),
        }
    }

    /// Add a value; `key` may be `KEY` or `namespace:KEY`.
    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.entries.push((key.to_string(), value.to_string(), false));
        self
    }

    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.entries.push((key.to_string(), value.to_string(), true));
        self
    }

    pub fn to_yaml(&self) -> String {
        let mut yaml = format!("project: {}\nconfig:\n", self.project);
        for (key, value, secret) in &self.entries {
            if *secret {
                yaml.push_str(&format!("  \"{}\":\n    secret: \"{}\"\n", key, value));
            } else {
                yaml.push_str(&format!("  \"{}\": \"{}\"\n", key, value));
            }
        }
        yaml
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_stack(&self, builder: &TestStackBuilder) -> PathBuf {
        let path = self.path().join("stack.yaml");
        std::fs::write(&path, builder.to_yaml()).expect("Failed to write stack file");
        path
    }

    /// Write a template at `relative` (directories are created).
    pub fn write_template(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create template directory");
        }
        std::fs::write(&path, content).expect("Failed to write template");
        path
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative)).expect("Failed to read output")
    }

    /// Run the binary with the environment directory as working directory.
    pub fn stackform(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_stackform"))
            .current_dir(self.path())
            .args(["--no-color", "--config", "missing-stackform.yaml"])
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute stackform")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
