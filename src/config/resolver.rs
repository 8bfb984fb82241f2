// ABOUTME: Resolves candidate template variable names against the configuration store
// ABOUTME: Applies exclusion rules, namespace prefixes, the upper-case contract and secret detection

use std::collections::BTreeSet;
use tracing::debug;

use super::error::Result;
use super::store::{ConfigStore, NamespaceConfig};
use super::value::{ResolvedValue, VariableMap};

pub const SECRET_VARIABLE_PREFIX: &str = "SECRET_";
pub const PARENT_NAMESPACE_PREFIX: &str = "parent:";

/// Where a variable name points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceKey {
    /// `KEY` in the current namespace.
    Current(String),
    /// `parent:KEY`
    Parent(String),
    /// `NAMESPACE:KEY`
    Named { namespace: String, key: String },
}

impl NamespaceKey {
    pub fn parse(name: &str) -> Self {
        if let Some(key) = name.strip_prefix(PARENT_NAMESPACE_PREFIX) {
            return Self::Parent(key.to_string());
        }
        match name.split_once(':') {
            Some((namespace, key)) => Self::Named {
                namespace: namespace.to_string(),
                key: key.to_string(),
            },
            None => Self::Current(name.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Current(key) | Self::Parent(key) => key,
            Self::Named { key, .. } => key,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.key().starts_with(SECRET_VARIABLE_PREFIX)
    }
}

/// Only `[A-Z0-9_]+` keys are configuration variables.
pub fn is_config_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Target key for `name` when it is a configuration variable.
///
/// Registered helper names, `@data` references, `this.` and `../` paths are
/// never configuration variables, nor is any key that is not all upper case.
pub fn config_variable_key(name: &str, ignored: &BTreeSet<String>) -> Option<NamespaceKey> {
    if ignored.contains(name)
        || name.starts_with('@')
        || name.starts_with("this.")
        || name.starts_with("../")
    {
        return None;
    }
    let key = NamespaceKey::parse(name);
    is_config_key(key.key()).then_some(key)
}

/// Resolver bound to one namespace and the engine's ignored names.
pub struct VariableResolver<'a> {
    config: NamespaceConfig<'a>,
    ignored: &'a BTreeSet<String>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(store: &'a ConfigStore, namespace: &str, ignored: &'a BTreeSet<String>) -> Self {
        Self {
            config: store.namespace(namespace),
            ignored,
        }
    }

    pub fn namespace(&self) -> &str {
        self.config.name()
    }

    pub fn applicable(&self, name: &str) -> Option<NamespaceKey> {
        config_variable_key(name, self.ignored)
    }

    /// Resolve one candidate name. `Ok(None)` means the name is not a configuration variable.
    pub fn resolve(&self, name: &str) -> Result<Option<ResolvedValue>> {
        let Some(target) = self.applicable(name) else {
            return Ok(None);
        };

        let config = match &target {
            NamespaceKey::Current(_) => self.config.clone(),
            NamespaceKey::Parent(_) => self.config.parent()?,
            NamespaceKey::Named { namespace, .. } => self.config.sibling(namespace),
        };

        let value = if target.is_secret() {
            config.require_secret(target.key())?
        } else {
            config.require(target.key())?
        };

        debug!(
            "Resolved '{}' from namespace '{}' (secret: {})",
            name,
            config.name(),
            value.is_secret()
        );
        Ok(Some(value))
    }

    /// Resolve every applicable name; excluded names contribute nothing.
    pub fn resolve_all<'n>(&self, names: impl IntoIterator<Item = &'n String>) -> Result<VariableMap> {
        let mut resolved = VariableMap::new();
        for name in names {
            if let Some(value) = self.resolve(name)? {
                resolved.insert(name.clone(), value);
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ConfigLayer};

    fn store() -> ConfigStore {
        ConfigStore::new("app").with_layer(
            ConfigLayer::new("test")
                .with_value("app", "DOMAIN", "example.com", false)
                .with_value("app", "myVar", "nope", false)
                .with_value("app", "SECRET_TOKEN", "t0k", false)
                .with_value("app#sub", "PORT", "8080", false)
                .with_value("dns", "ZONE", "example.org", false),
        )
    }

    #[test]
    fn test_namespace_key_parsing() {
        assert_eq!(NamespaceKey::parse("KEY"), NamespaceKey::Current("KEY".into()));
        assert_eq!(NamespaceKey::parse("parent:KEY"), NamespaceKey::Parent("KEY".into()));
        assert_eq!(
            NamespaceKey::parse("dns:ZONE"),
            NamespaceKey::Named {
                namespace: "dns".into(),
                key: "ZONE".into()
            }
        );
        assert!(NamespaceKey::parse("dns:SECRET_X").is_secret());
    }

    #[test]
    fn test_mixed_case_is_excluded() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        assert!(resolver.resolve("myVar").unwrap().is_none());
    }

    #[test]
    fn test_secret_prefix_uses_secret_fetch() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        let value = resolver.resolve("SECRET_TOKEN").unwrap().unwrap();
        assert!(value.is_secret());
        assert_eq!(value.expose(), "t0k");

        let domain = resolver.resolve("DOMAIN").unwrap().unwrap();
        assert!(!domain.is_secret());
    }

    #[test]
    fn test_parent_at_root_fails() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        assert!(matches!(
            resolver.resolve("parent:DOMAIN"),
            Err(ConfigError::ParentOfRootNamespace(_))
        ));
    }

    #[test]
    fn test_parent_in_nested_namespace() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app#sub", &ignored);
        assert_eq!(
            resolver.resolve("parent:DOMAIN").unwrap().unwrap().expose(),
            "example.com"
        );
        assert_eq!(resolver.resolve("PORT").unwrap().unwrap().expose(), "8080");
    }

    #[test]
    fn test_named_namespace() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        assert_eq!(
            resolver.resolve("dns:ZONE").unwrap().unwrap().expose(),
            "example.org"
        );
    }

    #[test]
    fn test_exclusions() {
        let store = store();
        let ignored: BTreeSet<String> = ["DOMAIN".to_string()].into_iter().collect();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        assert!(resolver.resolve("DOMAIN").unwrap().is_none());
        assert!(resolver.resolve("@INDEX").unwrap().is_none());
        assert!(resolver.resolve("this.DOMAIN").unwrap().is_none());
        assert!(resolver.resolve("../DOMAIN").unwrap().is_none());
    }

    #[test]
    fn test_missing_required_value() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        assert!(matches!(
            resolver.resolve("ABSENT"),
            Err(ConfigError::MissingRequiredValue { .. })
        ));
    }

    #[test]
    fn test_resolve_all_skips_excluded() {
        let store = store();
        let ignored = BTreeSet::new();
        let resolver = VariableResolver::new(&store, "app", &ignored);
        let names: Vec<String> = vec!["DOMAIN".into(), "lowercase".into()];
        let map = resolver.resolve_all(&names).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("DOMAIN"));
    }
}
