// ABOUTME: Auxiliary render data passed alongside resolved configuration variables
// ABOUTME: Holds caller-supplied values plus run metadata, merged under the resolved bindings

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::error::{Result, TemplateError};
use crate::config::{variables_to_json, VariableMap};

/// Extra data visible to templates. Resolved configuration bindings always
/// win over a key of the same name here.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

impl RunInfo {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying a `run` object with a fresh id and start time.
    pub fn for_run() -> Result<Self> {
        let mut context = Self::new();
        context.insert("run", &RunInfo::new())?;
        Ok(context)
    }

    /// Parse `key=value` pairs, as given on the command line.
    pub fn from_pairs(pairs: &[String]) -> Result<Self> {
        let mut context = Self::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                TemplateError::RenderError(format!(
                    "Invalid data format '{}'. Expected key=value",
                    pair
                ))
            })?;
            context.set(key.trim(), JsonValue::String(value.to_string()));
        }
        Ok(context)
    }

    pub fn set(&mut self, key: impl Into<String>, value: JsonValue) {
        self.values.insert(key.into(), value);
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn extend(&mut self, other: &TemplateContext) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render-time data: this context overlaid with the resolved bindings.
    pub fn merged_with(&self, variables: &VariableMap) -> JsonValue {
        let mut merged = self.values.clone();
        if let JsonValue::Object(bindings) = variables_to_json(variables) {
            merged.extend(bindings);
        }
        JsonValue::Object(merged)
    }
}
