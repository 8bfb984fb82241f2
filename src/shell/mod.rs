// ABOUTME: Shell-facing helpers for passing resolved variables to remote commands
// ABOUTME: Bash escaping, env assignment strings and ${name} reference extraction

pub mod env;

pub use env::{
    escape_bash_env_value, extract_variable_names, stringify_env_for_command,
    stringify_env_for_script, EnvMap,
};
