// ABOUTME: Layered key-value configuration store with '#'-nested namespaces
// ABOUTME: Loads stack files, applies override layers, and hands out per-namespace accessors

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use super::error::{ConfigError, Result};
use super::value::ResolvedValue;

pub const NAMESPACE_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub secret: bool,
}

/// On-disk stack file. Keys are `KEY` (project namespace) or `namespace:KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    pub project: String,

    #[serde(default)]
    pub config: IndexMap<String, YamlValue>,
}

/// One layer of configuration. Later layers override earlier ones.
#[derive(Clone, Default)]
pub struct ConfigLayer {
    pub name: String,
    values: BTreeMap<String, BTreeMap<String, StoredValue>>,
}

impl std::fmt::Debug for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .values
            .iter()
            .flat_map(|(ns, keys)| keys.keys().map(move |k| format!("{}:{}", ns, k)))
            .collect();
        f.debug_struct("ConfigLayer")
            .field("name", &self.name)
            .field("keys", &keys)
            .finish()
    }
}

impl ConfigLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Insert a value; returns self for chaining.
    pub fn with_value(mut self, namespace: &str, key: &str, value: &str, secret: bool) -> Self {
        self.insert(namespace, key, value, secret);
        self
    }

    pub fn insert(&mut self, namespace: &str, key: &str, value: &str, secret: bool) {
        self.values.entry(namespace.to_string()).or_default().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                secret,
            },
        );
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&StoredValue> {
        self.values.get(namespace).and_then(|keys| keys.get(key))
    }

    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a layer from a parsed stack file.
    pub fn from_stack_file(name: impl Into<String>, stack: &StackFile) -> Result<Self> {
        let mut layer = Self::new(name);
        for (raw_key, raw_value) in &stack.config {
            let (namespace, key) = split_qualified_key(raw_key, &stack.project)?;
            let (value, secret) = stored_value_from_yaml(raw_key, raw_value)?;
            layer.insert(namespace, key, &value, secret);
        }
        Ok(layer)
    }

    /// Build a layer from `namespace:KEY=value` assignments (bare keys use `default_namespace`).
    pub fn from_assignments(
        name: impl Into<String>,
        default_namespace: &str,
        assignments: &[String],
    ) -> Result<Self> {
        let mut layer = Self::new(name);
        for assignment in assignments {
            let (raw_key, value) = assignment
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidKey(assignment.clone()))?;
            let (namespace, key) = split_qualified_key(raw_key.trim(), default_namespace)?;
            let secret = key.starts_with(super::resolver::SECRET_VARIABLE_PREFIX);
            layer.insert(namespace, key, value, secret);
        }
        Ok(layer)
    }
}

fn split_qualified_key<'a>(raw_key: &'a str, default_namespace: &'a str) -> Result<(&'a str, &'a str)> {
    let (namespace, key) = match raw_key.rsplit_once(':') {
        Some((namespace, key)) => (namespace, key),
        None => (default_namespace, raw_key),
    };
    if namespace.is_empty() || key.is_empty() {
        return Err(ConfigError::InvalidKey(raw_key.to_string()));
    }
    Ok((namespace, key))
}

fn stored_value_from_yaml(key: &str, value: &YamlValue) -> Result<(String, bool)> {
    match value {
        YamlValue::String(s) => Ok((s.clone(), false)),
        YamlValue::Number(n) => Ok((n.to_string(), false)),
        YamlValue::Bool(b) => Ok((b.to_string(), false)),
        YamlValue::Mapping(map) => match map.get("secret") {
            Some(inner) => {
                let (value, _) = stored_value_from_yaml(key, inner)?;
                Ok((value, true))
            }
            None => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "mappings must have the form { secret: <value> }".to_string(),
            }),
        },
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "expected a string, number, boolean or { secret: <value> }".to_string(),
        }),
    }
}

/// Ordered stack of configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    default_namespace: String,
    layers: Vec<ConfigLayer>,
}

impl ConfigStore {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        Self {
            default_namespace: default_namespace.into(),
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: ConfigLayer) -> Self {
        self.push_layer(layer);
        self
    }

    pub fn push_layer(&mut self, layer: ConfigLayer) {
        debug!("Adding configuration layer '{}' ({} keys)", layer.name, layer.len());
        self.layers.push(layer);
    }

    /// Parse a stack file from YAML text.
    pub fn from_yaml_str(name: &str, yaml: &str) -> Result<Self> {
        let stack: StackFile = serde_yaml::from_str(yaml)?;
        let layer = ConfigLayer::from_stack_file(name, &stack)?;
        Ok(Self::new(stack.project).with_layer(layer))
    }

    /// Load a stack file from disk.
    pub fn load_stack_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&path.display().to_string(), &contents)
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Topmost stored value for `namespace:key`.
    pub fn lookup(&self, namespace: &str, key: &str) -> Option<&StoredValue> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(namespace, key))
    }

    pub fn namespace(&self, name: impl Into<String>) -> NamespaceConfig<'_> {
        NamespaceConfig {
            store: self,
            name: name.into(),
        }
    }

    pub fn default_config(&self) -> NamespaceConfig<'_> {
        self.namespace(self.default_namespace.clone())
    }
}

/// Accessor bound to one namespace of a store.
#[derive(Debug, Clone)]
pub struct NamespaceConfig<'a> {
    store: &'a ConfigStore,
    name: String,
}

impl<'a> NamespaceConfig<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace one `#` segment up.
    pub fn parent(&self) -> Result<NamespaceConfig<'a>> {
        match self.name.rfind(NAMESPACE_SEPARATOR) {
            Some(idx) => Ok(self.store.namespace(&self.name[..idx])),
            None => Err(ConfigError::ParentOfRootNamespace(self.name.clone())),
        }
    }

    pub fn sibling(&self, name: &str) -> NamespaceConfig<'a> {
        self.store.namespace(name)
    }

    pub fn get(&self, key: &str) -> Option<ResolvedValue> {
        self.store
            .lookup(&self.name, key)
            .map(|stored| ResolvedValue::new(stored.value.clone(), stored.secret))
    }

    /// Plain fetch. A value stored as secret stays secret.
    pub fn require(&self, key: &str) -> Result<ResolvedValue> {
        let value = self.get(key).ok_or_else(|| self.missing(key))?;
        if value.is_secret() {
            warn!(
                "Configuration value '{}:{}' is stored as a secret but was read as plain; keeping it secret",
                self.name, key
            );
        }
        Ok(value)
    }

    /// Secret-preserving fetch: the result is always tagged secret.
    pub fn require_secret(&self, key: &str) -> Result<ResolvedValue> {
        let value = self.get(key).ok_or_else(|| self.missing(key))?;
        Ok(ResolvedValue::secret(value.into_inner()))
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingRequiredValue {
            namespace: self.name.clone(),
            key: key.to_string(),
        }
    }
}
