// ABOUTME: Resolved configuration values with secret tagging
// ABOUTME: Secret values never show up in Debug output; the raw text is reached through expose()

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Name -> value bindings built while resolving a template's variables.
pub type VariableMap = BTreeMap<String, ResolvedValue>;

#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    value: String,
    secret: bool,
}

impl ResolvedValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }

    pub fn new(value: impl Into<String>, secret: bool) -> Self {
        Self {
            value: value.into(),
            secret,
        }
    }

    /// Raw text. Callers must not log this for secret values.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Replace the text while keeping the value secret if either side is.
    pub fn with_value(&self, value: String, tainted: bool) -> Self {
        Self {
            value,
            secret: self.secret || tainted,
        }
    }

    /// Apply a transformation to the text, keeping the secret tag.
    pub fn map(&self, f: impl FnOnce(&str) -> String) -> Self {
        Self {
            value: f(&self.value),
            secret: self.secret,
        }
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            f.debug_tuple("Secret").field(&"[REDACTED]").finish()
        } else {
            f.debug_tuple("Plain").field(&self.value).finish()
        }
    }
}

/// Render-time data context: every binding exposed as a JSON string.
pub fn variables_to_json(variables: &VariableMap) -> JsonValue {
    let object = variables
        .iter()
        .map(|(name, value)| (name.clone(), JsonValue::String(value.expose().to_string())))
        .collect::<serde_json::Map<_, _>>();
    JsonValue::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let value = ResolvedValue::secret("hunter2");
        let debug = format!("{:?}", value);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(value.expose(), "hunter2");
    }

    #[test]
    fn test_plain_debug_shows_value() {
        let value = ResolvedValue::plain("example.com");
        assert!(format!("{:?}", value).contains("example.com"));
    }

    #[test]
    fn test_taint_propagates() {
        let plain = ResolvedValue::plain("a");
        assert!(plain.with_value("b".to_string(), true).is_secret());
        assert!(!plain.with_value("b".to_string(), false).is_secret());
        assert!(ResolvedValue::secret("a").map(|s| s.to_uppercase()).is_secret());
    }

    #[test]
    fn test_variables_to_json() {
        let mut vars = VariableMap::new();
        vars.insert("DOMAIN".to_string(), ResolvedValue::plain("example.com"));
        vars.insert("SECRET_TOKEN".to_string(), ResolvedValue::secret("t0k"));
        let json = variables_to_json(&vars);
        assert_eq!(json["DOMAIN"], "example.com");
        assert_eq!(json["SECRET_TOKEN"], "t0k");
    }
}
