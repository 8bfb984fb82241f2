// ABOUTME: Namespaced, layered configuration store and variable resolution
// ABOUTME: Maps template variable names onto namespace/key lookups with secret tracking

pub mod error;
pub mod resolver;
pub mod store;
pub mod value;

pub use error::{ConfigError, Result};
pub use resolver::{config_variable_key, NamespaceKey, VariableResolver};
pub use store::{ConfigLayer, ConfigStore, NamespaceConfig, StackFile, StoredValue};
pub use value::{variables_to_json, ResolvedValue, VariableMap};
